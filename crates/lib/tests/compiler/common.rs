//! Shared bricks and helpers for compiler tests.

use icbrick_lib::builder::{Brick, BuildContext};
use icbrick_lib::compiler::{CompileOutput, Compiler};
use icbrick_lib::config::CompilerConfig;
use icbrick_lib::emit::Document;
use icbrick_lib::error::CompileError;
use icbrick_lib::value::Value;

pub fn compile(root: &str, brick: &dyn Brick, params: &Value) -> Result<CompileOutput, CompileError> {
  compile_with(CompilerConfig::default(), root, brick, params)
}

pub fn compile_with(
  config: CompilerConfig,
  root: &str,
  brick: &dyn Brick,
  params: &Value,
) -> Result<CompileOutput, CompileError> {
  Compiler::new(config).compile(root, brick, params)
}

pub fn doc_json(doc: &Document) -> serde_json::Value {
  doc.json().expect("document body is valid JSON")
}

pub fn root_json(out: &CompileOutput) -> serde_json::Value {
  doc_json(&out.templates.root)
}

/// A security group and a web server in it; returns the server URL.
pub fn web_server(ctx: &mut BuildContext<'_>, params: &Value) -> Result<Value, CompileError> {
  let instance_type = match params {
    Value::Map(map) => map.get("instance_type").cloned().unwrap_or_else(|| Value::from("t3.micro")),
    _ => Value::from("t3.micro"),
  };

  let group = ctx.resource(
    "web_sg",
    "AWS::EC2::SecurityGroup",
    Value::map([
      ("GroupDescription", Value::from("web ingress")),
      (
        "SecurityGroupIngress",
        Value::List(vec![Value::map([
          ("IpProtocol", Value::from("tcp")),
          ("FromPort", Value::from(80)),
          ("ToPort", Value::from(80)),
          ("CidrIp", Value::from("0.0.0.0/0")),
        ])]),
      ),
    ]),
  )?;

  let instance = ctx.resource(
    "web",
    "AWS::EC2::Instance",
    Value::map([
      ("ImageId", Value::from("ami-0abcdef1234567890")),
      ("InstanceType", instance_type),
      ("SecurityGroupIds", Value::List(vec![group.attr("GroupId")])),
    ]),
  )?;

  Value::concat([Value::from("http://"), instance.attr("PublicIp")])
}
