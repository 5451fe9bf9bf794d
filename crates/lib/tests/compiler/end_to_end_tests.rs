//! Whole passes from a brick to templates.

use serde_json::json;

use icbrick_lib::builder::{BrickOptions, ResourceOptions, brick_fn};
use icbrick_lib::compiler::stack_name;
use icbrick_lib::config::CompilerConfig;
use icbrick_lib::native::Native;
use icbrick_lib::registry::{DeletionPolicy, LogicalId, ScopePath};
use icbrick_lib::stdlib;
use icbrick_lib::value::Value;

use super::common::{compile, compile_with, root_json, web_server};

mod web_server {
  use super::*;

  fn ids() -> (LogicalId, LogicalId) {
    let root = ScopePath::root("app");
    (LogicalId::derive(&root, "web_sg"), LogicalId::derive(&root, "web"))
  }

  #[test]
  fn security_group_precedes_instance() {
    let out = compile("app", &web_server, &Value::Null).unwrap();
    let (group, instance) = ids();
    assert_eq!(out.order, vec![group.clone(), instance.clone()]);

    let json = root_json(&out);
    assert_eq!(json["Metadata"]["order"], json!([group.as_str(), instance.as_str()]));
    assert_eq!(
      json["Resources"][instance.as_str()]["Properties"]["SecurityGroupIds"],
      json!([{ "Fn::GetAtt": [group.as_str(), "GroupId"] }])
    );
  }

  #[test]
  fn url_output_joins_literal_and_attribute() {
    let out = compile("app", &web_server, &Value::Null).unwrap();
    let (_, instance) = ids();
    let ip = json!({ "Fn::GetAtt": [instance.as_str(), "PublicIp"] });
    assert_eq!(out.output.to_json(), json!({ "Fn::Join": ["", ["http://", ip]] }));
    assert_eq!(
      root_json(&out)["Outputs"]["value"]["Value"],
      json!({ "Fn::Join": ["", ["\"http://", ip, "\""]] })
    );
  }

  #[test]
  fn repeated_passes_are_byte_identical() {
    let first = compile("app", &web_server, &Value::Null).unwrap();
    let second = compile("app", &web_server, &Value::Null).unwrap();
    assert_eq!(first.templates.root.body, second.templates.root.body);
    assert_eq!(first.order, second.order);
  }

  #[test]
  fn parameters_flow_into_properties() {
    let params = Value::map([("instance_type", Value::from("m5.large"))]);
    let out = compile("app", &web_server, &params).unwrap();
    let (_, instance) = ids();
    assert_eq!(
      root_json(&out)["Resources"][instance.as_str()]["Properties"]["InstanceType"],
      "m5.large"
    );
  }

  #[test]
  fn template_keys_are_in_canonical_order() {
    let out = compile("app", &web_server, &Value::Null).unwrap();
    let json = root_json(&out);
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["AWSTemplateFormatVersion", "Description", "Metadata", "Resources", "Outputs"]);
    assert_eq!(json["AWSTemplateFormatVersion"], "2010-09-09");
  }

  #[test]
  fn description_comes_from_config() {
    let config = CompilerConfig::new().with_description("storefront");
    let out = compile_with(config, "app", &web_server, &Value::Null).unwrap();
    assert_eq!(root_json(&out)["Description"], "storefront");
  }
}

mod composition {
  use super::*;

  #[test]
  fn same_short_name_in_sibling_bricks_gets_distinct_ids() {
    let app = brick_fn(|ctx, _| {
      let a = ctx.brick("blue", &web_server, &Value::Null)?;
      let b = ctx.brick("green", &web_server, &Value::Null)?;
      Ok(Value::List(vec![a, b]))
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    assert_eq!(out.order.len(), 4);
    let mut unique = out.order.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 4);
  }

  #[test]
  fn metadata_tree_mirrors_invocations() {
    let app = brick_fn(|ctx, _| {
      ctx.resource("logs", "AWS::S3::Bucket", Value::Null)?;
      ctx.brick("site", &web_server, &Value::Null)
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    let tree = &root_json(&out)["Metadata"]["bricks"];
    assert_eq!(tree["name"], "app");
    assert_eq!(tree["children"][0]["name"], "logs");
    assert_eq!(tree["children"][1]["name"], "site");
    assert_eq!(tree["children"][1]["children"][0]["name"], "web_sg");
    assert_eq!(tree["children"][1]["children"][1]["type"], "AWS::EC2::Instance");
  }

  #[test]
  fn forward_references_order_by_dependency() {
    let app = brick_fn(|ctx, _| {
      let topic = ctx.forward_ref("alerts")?;
      ctx.resource(
        "alarm",
        "AWS::CloudWatch::Alarm",
        Value::map([("AlarmActions", Value::List(vec![topic.reference()]))]),
      )?;
      ctx.resource("alerts", "AWS::SNS::Topic", Value::Null)?;
      Ok(Value::Null)
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    let root = ScopePath::root("app");
    assert_eq!(
      out.order,
      vec![LogicalId::derive(&root, "alerts"), LogicalId::derive(&root, "alarm")]
    );
  }

  #[test]
  fn brick_ordering_hints_reach_every_inner_resource() {
    let app = brick_fn(|ctx, _| {
      let db = ctx.resource("db", "AWS::RDS::DBInstance", Value::Null)?;
      ctx.brick_with("site", &web_server, &Value::Null, BrickOptions::new().depends_on(&db))?;
      Ok(Value::Null)
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    let json = root_json(&out);
    let root = ScopePath::root("app");
    let db = LogicalId::derive(&root, "db");
    let site = root.child("site");
    for name in ["web_sg", "web"] {
      let id = LogicalId::derive(&site, name);
      assert_eq!(json["Resources"][id.as_str()]["DependsOn"], json!([db.as_str()]));
    }
  }

  #[test]
  fn deletion_policy_is_rendered() {
    let app = brick_fn(|ctx, _| {
      ctx.resource_with(
        "data",
        "AWS::S3::Bucket",
        Value::Null,
        ResourceOptions::new().deletion_policy(DeletionPolicy::Retain),
      )?;
      Ok(Value::Null)
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    let id = LogicalId::derive(&ScopePath::root("app"), "data");
    assert_eq!(root_json(&out)["Resources"][id.as_str()]["DeletionPolicy"], "Retain");
  }
}

mod interpolation {
  use super::*;

  #[test]
  fn arn_built_from_pseudo_parameters() {
    let app = brick_fn(|ctx, _| {
      let bucket = ctx.resource("assets", "AWS::S3::Bucket", Value::Null)?;
      Value::concat([
        Value::from("arn:"),
        stdlib::partition(),
        Value::from(":s3:::"),
        bucket.reference(),
        Value::from("/*"),
      ])
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    let id = LogicalId::derive(&ScopePath::root("app"), "assets");
    assert_eq!(
      out.output.to_json(),
      json!({ "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, ":s3:::", { "Ref": id.as_str() }, "/*"]] })
    );
  }

  #[test]
  fn literal_only_concat_folds() {
    let app = brick_fn(|ctx, _| {
      ctx.resource("jobs", "AWS::SQS::Queue", Value::Null)?;
      Value::concat([Value::from("a"), Value::from(1), Value::from("b")])
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    assert_eq!(out.output, Native::String("a1b".to_string()));
  }

  #[test]
  fn select_over_availability_zones() {
    let app = brick_fn(|ctx, _| {
      let az = stdlib::select(0, stdlib::get_azs(Value::Null)?)?;
      ctx.resource("subnet", "AWS::EC2::Subnet", Value::map([("AvailabilityZone", az)]))?;
      Ok(Value::Null)
    });
    let out = compile("app", &app, &Value::Null).unwrap();
    let id = LogicalId::derive(&ScopePath::root("app"), "subnet");
    assert_eq!(
      root_json(&out)["Resources"][id.as_str()]["Properties"]["AvailabilityZone"],
      json!({ "Fn::Select": [0, { "Fn::GetAZs": { "Ref": "AWS::Region" } }] })
    );
  }
}

#[test]
fn sensitive_parameter_is_no_echo() {
  let app = brick_fn(|ctx, _| {
    let secret = ctx.sensitive("DbPassword", &Value::from("s3cr3t"))?;
    ctx.resource("db", "AWS::RDS::DBInstance", Value::map([("MasterUserPassword", secret)]))?;
    Ok(Value::Null)
  });
  let out = compile("app", &app, &Value::Null).unwrap();
  let json = root_json(&out);
  assert_eq!(json["Parameters"]["DbPassword"], json!({ "Type": "String", "NoEcho": true }));
  assert!(!out.templates.root.body.contains("s3cr3t"));
  assert_eq!(out.parameter_values[0].parameter_value, "s3cr3t");
}

#[test]
fn stack_name_is_derived_from_root() {
  assert_eq!(stack_name("app"), stack_name("app"));
  assert!(stack_name("app").starts_with("ic-"));
}
