//! Bricks written in Lua, compiled end to end.

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use icbrick_lib::builder::MapLibrary;
use icbrick_lib::compiler::Compiler;
use icbrick_lib::config::CompilerConfig;
use icbrick_lib::lua::LuaBrick;
use icbrick_lib::registry::{LogicalId, ScopePath};
use icbrick_lib::value::Value;

use super::common::{compile, root_json, web_server};

const WEB_SERVER: &str = r#"
  return function(ctx, params)
    local sg = ctx:resource("web_sg", "AWS::EC2::SecurityGroup", {
      GroupDescription = "web ingress",
      SecurityGroupIngress = {
        { IpProtocol = "tcp", FromPort = 80, ToPort = 80, CidrIp = "0.0.0.0/0" },
      },
    })
    local web = ctx:resource("web", "AWS::EC2::Instance", {
      ImageId = "ami-0abcdef1234567890",
      InstanceType = params and params.instance_type or "t3.micro",
      SecurityGroupIds = { sg:attr("GroupId") },
    })
    return "http://" .. web:attr("PublicIp")
  end
"#;

#[test]
fn lua_and_rust_bricks_emit_the_same_template() {
  let lua = LuaBrick::from_source("web_server", WEB_SERVER).unwrap();
  let from_lua = compile("app", &lua, &Value::Null).unwrap();
  let from_rust = compile("app", &web_server, &Value::Null).unwrap();
  assert_eq!(from_lua.templates, from_rust.templates);
  assert_eq!(from_lua.output, from_rust.output);
}

#[test]
fn lua_bricks_are_deterministic() {
  let brick = LuaBrick::from_source("web_server", WEB_SERVER).unwrap();
  let params = Value::map([("instance_type", Value::from("m5.large"))]);
  let first = compile("app", &brick, &params).unwrap();
  let second = compile("app", &brick, &params).unwrap();
  assert_eq!(first.templates.root.body, second.templates.root.body);

  let instance = LogicalId::derive(&ScopePath::root("app"), "web");
  assert_eq!(
    root_json(&first)["Resources"][instance.as_str()]["Properties"]["InstanceType"],
    "m5.large"
  );
}

#[test]
fn library_mixes_lua_and_rust_bricks() {
  let mut library = MapLibrary::new();
  library.insert("acme.web_server", web_server).unwrap();
  library
    .insert("acme.site", LuaBrick::from_source("site", r#"
      return function(ctx, params)
        local url = ctx:import("acme.web_server", "server", params)
        ctx:resource("dns", "AWS::Route53::RecordSet", {
          Name = "shop.example.com",
          ResourceRecords = { url },
        })
        return url
      end
    "#).unwrap())
    .unwrap();

  let app = LuaBrick::from_source("app", r#"
    return function(ctx, params)
      return ctx:import("acme.site", "shop", {})
    end
  "#)
  .unwrap();

  let out = Compiler::new(CompilerConfig::default())
    .with_library(library)
    .compile("app", &app, &Value::Null)
    .unwrap();

  let shop = ScopePath::root("app").child("shop");
  let instance = LogicalId::derive(&shop.child("server"), "web");
  let dns = LogicalId::derive(&shop, "dns");
  assert_eq!(out.order.last(), Some(&dns));

  let json = root_json(&out);
  assert_eq!(
    json["Resources"][dns.as_str()]["Properties"]["ResourceRecords"],
    json!([{ "Fn::Join": ["", ["http://", { "Fn::GetAtt": [instance.as_str(), "PublicIp"] }]] }])
  );
  assert_eq!(json["Metadata"]["bricks"]["children"][0]["brick"], "acme.site");
  assert_eq!(json["Metadata"]["bricks"]["children"][0]["children"][0]["brick"], "acme.web_server");
}

#[test]
fn lua_cycle_is_detected() {
  let brick = LuaBrick::from_source("cycle", r#"
    return function(ctx, params)
      local b = ctx:ref("b")
      local a = ctx:resource("a", "AWS::SQS::Queue", { Peer = b:attr("Arn") })
      ctx:resource("b", "AWS::SQS::Queue", { Peer = a:attr("Arn") })
    end
  "#)
  .unwrap();
  let err = compile("app", &brick, &Value::Null).unwrap_err();
  assert_eq!(err.kind(), "CyclicDependency");
}

#[test]
fn concatenating_a_list_intrinsic_fails() {
  let brick = LuaBrick::from_source("zones", r#"
    return function(ctx, params)
      ctx:resource("topic", "AWS::SNS::Topic", { DisplayName = "zones: " .. ic.get_azs() })
    end
  "#)
  .unwrap();
  let err = compile("app", &brick, &Value::Null).unwrap_err();
  assert_eq!(err.kind(), "ValueType");
}

#[test]
fn brick_file_with_intrinsics() {
  let temp_dir = TempDir::new().unwrap();
  let path = temp_dir.path().join("subnets.lua");
  fs::write(
    &path,
    r#"
      return function(ctx, params)
        local vpc = ctx:resource("vpc", "AWS::EC2::VPC", { CidrBlock = params.cidr })
        local blocks = ic.cidr(vpc:attr("CidrBlock"), 2, 8)
        for i, name in ipairs({ "a", "b" }) do
          ctx:resource("subnet_" .. name, "AWS::EC2::Subnet", {
            VpcId = vpc:ref(),
            CidrBlock = ic.select(i - 1, blocks),
            AvailabilityZone = ic.select(i - 1, ic.get_azs()),
          })
        end
      end
    "#,
  )
  .unwrap();

  let brick = LuaBrick::from_file(&path).unwrap();
  let out = compile("app", &brick, &Value::map([("cidr", Value::from("10.0.0.0/16"))])).unwrap();
  let root = ScopePath::root("app");
  let vpc = LogicalId::derive(&root, "vpc");
  let subnet_b = LogicalId::derive(&root, "subnet_b");

  let json = root_json(&out);
  let props = &json["Resources"][subnet_b.as_str()]["Properties"];
  assert_eq!(
    props["CidrBlock"],
    json!({ "Fn::Select": [1, { "Fn::Cidr": [{ "Fn::GetAtt": [vpc.as_str(), "CidrBlock"] }, 2, 8] }] })
  );
  assert_eq!(
    props["AvailabilityZone"],
    json!({ "Fn::Select": [1, { "Fn::GetAZs": { "Ref": "AWS::Region" } }] })
  );
  assert_eq!(out.order[0], vpc);
}
