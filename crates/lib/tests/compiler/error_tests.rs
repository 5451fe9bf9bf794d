//! Passes that must fail, and how.

use icbrick_lib::builder::{BuildContext, ResourceOptions, brick_fn};
use icbrick_lib::config::{CompilerConfig, Limits, TemplateProfile};
use icbrick_lib::error::CompileError;
use icbrick_lib::registry::{LogicalId, ScopePath};
use icbrick_lib::stdlib;
use icbrick_lib::value::Value;

use super::common::{compile, compile_with, web_server};

fn id(name: &str) -> LogicalId {
  LogicalId::derive(&ScopePath::root("app"), name)
}

mod graph {
  use super::*;

  #[test]
  fn mutual_references_are_a_cycle() {
    let app = brick_fn(|ctx, _| {
      let b = ctx.forward_ref("b")?;
      let a = ctx.resource("a", "AWS::SQS::Queue", Value::map([("Peer", b.attr("Arn"))]))?;
      ctx.resource("b", "AWS::SQS::Queue", Value::map([("Peer", a.attr("Arn"))]))?;
      Ok(Value::Null)
    });
    match compile("app", &app, &Value::Null).unwrap_err() {
      CompileError::CyclicDependency { cycle } => {
        assert!(cycle.contains(&id("a")));
        assert!(cycle.contains(&id("b")));
        assert_eq!(cycle.0.first(), cycle.0.last());
      }
      other => panic!("expected CyclicDependency, got {other:?}"),
    }
  }

  #[test]
  fn explicit_ordering_can_close_a_cycle() {
    let app = brick_fn(|ctx, _| {
      let b = ctx.forward_ref("b")?;
      let a = ctx.resource_with("a", "AWS::SQS::Queue", Value::Null, ResourceOptions::new().depends_on(&b))?;
      ctx.resource_with("b", "AWS::SQS::Queue", Value::Null, ResourceOptions::new().depends_on(&a))?;
      Ok(Value::Null)
    });
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "CyclicDependency");
  }

  /// `app.x.a` reads `app.y.b`, which reads `app.x.a` back.
  fn crossed(ctx: &mut BuildContext<'_>, _: &Value) -> Result<Value, CompileError> {
    let b = ctx.forward_ref_in(&ctx.scope().child("y"), "b")?;
    let a_arn = ctx.brick(
      "x",
      &brick_fn(move |ctx, _| {
        let a = ctx.resource("a", "AWS::SQS::Queue", Value::map([("Peer", b.attr("Arn"))]))?;
        Ok(a.attr("Arn"))
      }),
      &Value::Null,
    )?;
    ctx.brick(
      "y",
      &brick_fn(move |ctx, _| {
        ctx.resource("b", "AWS::SQS::Queue", Value::map([("Peer", a_arn.clone())]))?;
        Ok(Value::Null)
      }),
      &Value::Null,
    )
  }

  fn assert_crossed_cycle(err: CompileError) {
    let root = ScopePath::root("app");
    let a = LogicalId::derive(&root.child("x"), "a");
    let b = LogicalId::derive(&root.child("y"), "b");
    match err {
      CompileError::CyclicDependency { cycle } => {
        assert!(cycle.contains(&a), "{cycle}");
        assert!(cycle.contains(&b), "{cycle}");
      }
      other => panic!("expected CyclicDependency, got {other:?}"),
    }
  }

  #[test]
  fn cycle_across_sibling_bricks() {
    assert_crossed_cycle(compile("app", &crossed, &Value::Null).unwrap_err());
  }

  #[test]
  fn cycle_across_bricks_is_reported_before_splitting() {
    let config = CompilerConfig::new().with_limits(Limits {
      max_resources: 1,
      ..Limits::default()
    });
    assert_crossed_cycle(compile_with(config, "app", &crossed, &Value::Null).unwrap_err());
  }

  #[test]
  fn undeclared_target_is_dangling() {
    let app = brick_fn(|ctx, _| {
      let ghost = ctx.forward_ref("ghost")?;
      ctx.resource("queue", "AWS::SQS::Queue", Value::map([("Dlq", ghost.reference())]))?;
      Ok(Value::Null)
    });
    match compile("app", &app, &Value::Null).unwrap_err() {
      CompileError::DanglingReference { target, .. } => assert_eq!(target, id("ghost")),
      other => panic!("expected DanglingReference, got {other:?}"),
    }
  }

  #[test]
  fn dangling_reference_in_output_is_rejected() {
    let app = brick_fn(|ctx, _| Ok(ctx.forward_ref("ghost")?.attr("Arn")));
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "DanglingReference");
  }

  #[test]
  fn self_reference_is_rejected() {
    let app = brick_fn(|ctx, _| {
      let me = ctx.forward_ref("queue")?;
      ctx.resource("queue", "AWS::SQS::Queue", Value::map([("Name", me.attr("QueueName"))]))?;
      Ok(Value::Null)
    });
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "UnresolvedSelfReference");
  }
}

mod naming {
  use super::*;

  #[test]
  fn duplicate_short_name_in_one_scope() {
    let app = brick_fn(|ctx, _| {
      ctx.resource("web", "AWS::EC2::Instance", Value::Null)?;
      ctx.resource("web", "AWS::EC2::Instance", Value::Null)?;
      Ok(Value::Null)
    });
    match compile("app", &app, &Value::Null).unwrap_err() {
      CompileError::DuplicateIdentifier { id: dup, .. } => assert_eq!(dup, id("web")),
      other => panic!("expected DuplicateIdentifier, got {other:?}"),
    }
  }

  #[test]
  fn brick_and_resource_share_a_namespace() {
    let app = brick_fn(|ctx, _| {
      ctx.resource("site", "AWS::S3::Bucket", Value::Null)?;
      ctx.brick("site", &web_server, &Value::Null)
    });
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "DuplicateIdentifier");
  }

  #[test]
  fn invoking_the_same_brick_twice_under_one_name() {
    let app = brick_fn(|ctx, _| {
      ctx.brick("site", &web_server, &Value::Null)?;
      ctx.brick("site", &web_server, &Value::Null)
    });
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "DuplicateIdentifier");
  }

  #[test]
  fn malformed_names_are_rejected() {
    for name in ["", "Web", "9lives", "web-server", "webServer"] {
      let app = brick_fn(move |ctx, _| {
        ctx.resource(name, "AWS::SQS::Queue", Value::Null)?;
        Ok(Value::Null)
      });
      let err = compile("app", &app, &Value::Null).unwrap_err();
      assert_eq!(err.kind(), "InvalidShortName", "name {name:?}");
    }
  }

  #[test]
  fn unknown_library_brick() {
    let app = brick_fn(|ctx, _| ctx.import("acme.missing", "thing", &Value::Null));
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "UnknownBrick");
  }
}

mod values {
  use super::*;

  #[test]
  fn reading_a_reference_as_literal_fails() {
    let app = brick_fn(|ctx, _| {
      let queue = ctx.resource("queue", "AWS::SQS::Queue", Value::Null)?;
      let arn = queue.attr("Arn");
      let text = arn.as_str()?;
      Ok(Value::from(text.to_uppercase()))
    });
    let err = compile("app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "DeferredValueRead");
  }

  #[test]
  fn root_without_resources_is_rejected() {
    let empty = brick_fn(|_, _| Ok(Value::from("nothing here")));
    match compile("app", &empty, &Value::Null).unwrap_err() {
      CompileError::BrickFailed { scope, .. } => assert_eq!(scope, "app"),
      other => panic!("expected BrickFailed, got {other:?}"),
    }
  }

  #[test]
  fn brick_failures_name_their_scope() {
    let failing = brick_fn(|ctx, _| Err(ctx.failure("no capacity")));
    let app = brick_fn(move |ctx, _| ctx.brick("inner", &failing, &Value::Null));
    match compile("app", &app, &Value::Null).unwrap_err() {
      CompileError::BrickFailed { scope, message } => {
        assert_eq!(scope, "app.inner");
        assert_eq!(message, "no capacity");
      }
      other => panic!("expected BrickFailed, got {other:?}"),
    }
  }

  #[test]
  fn legacy_profile_rejects_sub() {
    let app = brick_fn(|ctx, _| {
      let name = stdlib::sub("${AWS::StackName}-jobs", Default::default())?;
      ctx.resource("queue", "AWS::SQS::Queue", Value::map([("QueueName", name)]))?;
      Ok(Value::Null)
    });
    let config = CompilerConfig::new().with_profile(TemplateProfile::Legacy);
    let err = compile_with(config, "app", &app, &Value::Null).unwrap_err();
    assert_eq!(err.kind(), "UnsupportedIntrinsic");

    assert!(compile("app", &app, &Value::Null).is_ok());
  }
}
