//! Nested document splitting and cross-document references.

use serde_json::json;

use icbrick_lib::builder::{BuildContext, brick_fn};
use icbrick_lib::config::{CompilerConfig, Limits};
use icbrick_lib::error::CompileError;
use icbrick_lib::registry::{LogicalId, ScopePath};
use icbrick_lib::value::Value;

use super::common::{compile_with, doc_json, root_json};

fn small(max_resources: usize) -> CompilerConfig {
  CompilerConfig::new().with_export_prefix("shop").with_limits(Limits {
    max_resources,
    ..Limits::default()
  })
}

fn root() -> ScopePath {
  ScopePath::root("app")
}

fn network(ctx: &mut BuildContext<'_>, _: &Value) -> Result<Value, CompileError> {
  let vpc = ctx.resource("vpc", "AWS::EC2::VPC", Value::map([("CidrBlock", Value::from("10.0.0.0/16"))]))?;
  for name in ["subnet_a", "subnet_b"] {
    ctx.resource(name, "AWS::EC2::Subnet", Value::map([("VpcId", vpc.reference())]))?;
  }
  Ok(vpc.reference())
}

mod exports {
  use super::*;

  fn app(ctx: &mut BuildContext<'_>, _: &Value) -> Result<Value, CompileError> {
    let vpc = ctx.brick("network", &network, &Value::Null)?;
    ctx.brick(
      "service",
      &brick_fn(move |ctx, _| {
        ctx.resource("sg", "AWS::EC2::SecurityGroup", Value::map([("VpcId", vpc.clone())]))?;
        Ok(Value::Null)
      }),
      &Value::Null,
    )
  }

  #[test]
  fn largest_brick_moves_to_nested_document() {
    let out = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    assert_eq!(out.templates.len(), 2);

    let network_id = LogicalId::derive(&root(), "network");
    let nested = &out.templates.nested[0];
    assert_eq!(nested.name, "app.network");
    assert_eq!(nested.file_name, format!("{}.template.json", network_id));

    let root_doc = root_json(&out);
    let stack = &root_doc["Resources"][network_id.as_str()];
    assert_eq!(stack["Type"], "AWS::CloudFormation::Stack");
    assert_eq!(stack["Properties"]["TemplateURL"], nested.file_name.as_str());
    assert_eq!(doc_json(nested)["Resources"].as_object().unwrap().len(), 3);
  }

  #[test]
  fn sibling_reference_becomes_import() {
    let out = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    let network_id = LogicalId::derive(&root(), "network");
    let vpc = LogicalId::derive(&root().child("network"), "vpc");
    let sg = LogicalId::derive(&root().child("service"), "sg");
    let export = format!("shop-{}-Ref", vpc);

    let nested = doc_json(&out.templates.nested[0]);
    assert_eq!(
      nested["Outputs"][format!("E{}Ref", vpc)],
      json!({ "Value": { "Ref": vpc.as_str() }, "Export": { "Name": export } })
    );

    let root_doc = root_json(&out);
    let consumer = &root_doc["Resources"][sg.as_str()];
    assert_eq!(consumer["Properties"]["VpcId"], json!({ "Fn::ImportValue": export }));
    assert_eq!(consumer["DependsOn"], json!([network_id.as_str()]));
  }

  #[test]
  fn metadata_points_at_nested_template() {
    let out = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    let tree = &root_json(&out)["Metadata"]["bricks"];
    assert_eq!(tree["children"][0]["name"], "network");
    assert_eq!(tree["children"][0]["type"], "AWS::CloudFormation::Stack");
    assert_eq!(tree["children"][0]["template"], out.templates.nested[0].file_name.as_str());
    assert_eq!(tree["children"][1]["children"][0]["name"], "sg");
  }

  #[test]
  fn split_output_is_deterministic() {
    let a = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    let b = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    assert_eq!(a.templates, b.templates);
  }
}

mod parameters {
  use super::*;

  fn app(ctx: &mut BuildContext<'_>, _: &Value) -> Result<Value, CompileError> {
    let logs = ctx.resource("logs", "AWS::S3::Bucket", Value::Null)?;
    let secret = ctx.sensitive("DbPassword", &Value::from("hunter2"))?;
    let arn = logs.attr("Arn");
    ctx.brick(
      "data",
      &brick_fn(move |ctx, _| {
        for name in ["primary", "replica", "reporting"] {
          ctx.resource(
            name,
            "AWS::RDS::DBInstance",
            Value::map([("MasterUserPassword", secret.clone()), ("LogBucketArn", arn.clone())]),
          )?;
        }
        Ok(Value::Null)
      }),
      &Value::Null,
    )
  }

  #[test]
  fn ancestor_values_pass_down_as_parameters() {
    let out = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    assert_eq!(out.templates.len(), 2);

    let logs = LogicalId::derive(&root(), "logs");
    let data = LogicalId::derive(&root(), "data");
    let param = format!("P{}Arn", logs);

    let root_doc = root_json(&out);
    let stack = &root_doc["Resources"][data.as_str()];
    assert_eq!(
      stack["Properties"]["Parameters"][param.as_str()],
      json!({ "Fn::GetAtt": [logs.as_str(), "Arn"] })
    );
    assert_eq!(root_doc["Metadata"]["order"], json!([logs.as_str(), data.as_str()]));

    let nested = doc_json(&out.templates.nested[0]);
    assert_eq!(nested["Parameters"][param.as_str()], json!({ "Type": "String" }));
    let primary = LogicalId::derive(&root().child("data"), "primary");
    assert_eq!(
      nested["Resources"][primary.as_str()]["Properties"]["LogBucketArn"],
      json!({ "Ref": param })
    );
  }

  #[test]
  fn sensitive_parameters_stay_no_echo() {
    let out = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    let data = LogicalId::derive(&root(), "data");

    let root_doc = root_json(&out);
    assert_eq!(root_doc["Parameters"]["DbPassword"]["NoEcho"], true);
    assert_eq!(
      root_doc["Resources"][data.as_str()]["Properties"]["Parameters"]["DbPassword"],
      json!({ "Ref": "DbPassword" })
    );

    let nested = doc_json(&out.templates.nested[0]);
    assert_eq!(nested["Parameters"]["DbPassword"], json!({ "Type": "String", "NoEcho": true }));
    for doc in out.templates.documents() {
      assert!(!doc.body.contains("hunter2"));
    }
  }
}

mod limits {
  use super::*;

  #[test]
  fn root_resources_cannot_be_split() {
    let app = brick_fn(|ctx, _| {
      for name in ["a", "b", "c"] {
        ctx.resource(name, "AWS::SQS::Queue", Value::Null)?;
      }
      Ok(Value::Null)
    });
    match compile_with(small(2), "app", &app, &Value::Null).unwrap_err() {
      CompileError::TemplateSizeExceeded {
        document,
        limit,
        actual,
        max,
      } => {
        assert_eq!(document, "app");
        assert_eq!(limit, "max_resources");
        assert_eq!((actual, max), (3, 2));
      }
      other => panic!("expected TemplateSizeExceeded, got {other:?}"),
    }
  }

  #[test]
  fn nested_bricks_split_recursively() {
    let app = brick_fn(|ctx, _| {
      ctx.brick(
        "outer",
        &brick_fn(|ctx, _| {
          ctx.resource("own", "AWS::SQS::Queue", Value::Null)?;
          ctx.brick("inner", &network, &Value::Null)
        }),
        &Value::Null,
      )
    });
    let out = compile_with(small(3), "app", &app, &Value::Null).unwrap();
    assert_eq!(out.templates.len(), 3);
    let names: Vec<&str> = out.templates.documents().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["app", "app.outer", "app.outer.inner"]);
  }

  #[test]
  fn within_limits_stays_single_document() {
    let out = compile_with(small(3), "app", &network, &Value::Null).unwrap();
    assert_eq!(out.templates.len(), 1);
    assert!(out.templates.nested.is_empty());
  }
}

mod interlocked {
  use super::*;

  /// `inner.a` reads the root topic, and the topic reads `inner.b`. The
  /// resources are acyclic, but a nested `inner` stack would have to wait
  /// on the topic while the topic waits on the stack.
  fn interlocked(ctx: &mut BuildContext<'_>, with_side: bool) -> Result<Value, CompileError> {
    let topic = ctx.forward_ref("topic")?;
    let b = ctx.forward_ref_in(&ctx.scope().child("inner"), "b")?;
    ctx.brick(
      "inner",
      &brick_fn(move |ctx, _| {
        ctx.resource("a", "AWS::SNS::Subscription", Value::map([("TopicArn", topic.reference())]))?;
        ctx.resource("b", "AWS::SQS::Queue", Value::Null)?;
        ctx.resource("c", "AWS::SQS::Queue", Value::Null)?;
        Ok(Value::Null)
      }),
      &Value::Null,
    )?;
    ctx.resource("topic", "AWS::SNS::Topic", Value::map([("DeadLetterArn", b.attr("Arn"))]))?;
    if with_side {
      ctx.brick(
        "side",
        &brick_fn(|ctx, _| {
          ctx.resource("x", "AWS::SQS::Queue", Value::Null)?;
          ctx.resource("y", "AWS::SQS::Queue", Value::Null)?;
          Ok(Value::Null)
        }),
        &Value::Null,
      )?;
    }
    Ok(Value::Null)
  }

  #[test]
  fn compiles_unsplit() {
    let app = brick_fn(|ctx, _| interlocked(ctx, false));
    let out = compile_with(CompilerConfig::new(), "app", &app, &Value::Null).unwrap();
    assert_eq!(out.templates.len(), 1);
  }

  #[test]
  fn no_acyclic_split_is_a_size_error() {
    let app = brick_fn(|ctx, _| interlocked(ctx, false));
    match compile_with(small(3), "app", &app, &Value::Null).unwrap_err() {
      CompileError::TemplateSizeExceeded {
        document,
        limit,
        actual,
        max,
      } => {
        assert_eq!(document, "app");
        assert_eq!(limit, "max_resources");
        assert_eq!((actual, max), (4, 3));
      }
      other => panic!("expected TemplateSizeExceeded, got {other:?}"),
    }
  }

  #[test]
  fn next_heaviest_brick_is_split_instead() {
    let app = brick_fn(|ctx, _| interlocked(ctx, true));
    let out = compile_with(small(5), "app", &app, &Value::Null).unwrap();
    assert_eq!(out.templates.len(), 2);
    assert_eq!(out.templates.nested[0].name, "app.side");

    let root_doc = root_json(&out);
    let inner_b = LogicalId::derive(&root().child("inner"), "b");
    assert!(root_doc["Resources"][inner_b.as_str()].is_object());
  }
}
