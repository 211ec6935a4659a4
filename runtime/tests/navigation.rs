use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use waystack_core::{
    Action, BackendKind, CallStack, Context, Frame, GlobalKey, Keying, NavConfig, NavError,
    Signer, Transfer, Value,
};
use waystack_runtime::transport::encode_wire_token;
use waystack_runtime::{
    ActionContext, BlobStore, Dispatched, Inbound, Keys, Link, LinkMethod, MemoryBlobStore,
    Navigator, PageOrigin, Registry, RenderContext,
};

const SECRET: &[u8] = b"integration-test-secret";

#[derive(Debug)]
struct Screen {
    text: String,
    links: BTreeMap<&'static str, Link>,
}

type Returns = Arc<Mutex<Vec<(Value, Context)>>>;

fn counter_app(returns: Returns) -> Registry<(), Screen> {
    Registry::new()
        .view("main", |ctx: &RenderContext<'_>, _: &()| {
            let mut links = BTreeMap::new();
            links.insert("noop", ctx.link_noop()?);
            links.insert("add_one", ctx.link_action("add_one", Context::new())?);
            links.insert("bad_double", ctx.link_action("double_goto", Context::new())?);
            links.insert("bad_ratio", ctx.link_action("divide_by_zero", Context::new())?);
            links.insert(
                "call_sub",
                ctx.link_call(
                    "sub",
                    Context::new().with("fizz", "buzz"),
                    Some("on_return".into()),
                    Context::new().with("extra", "EXTRA-STUFF"),
                )?,
            );
            links.insert("return", ctx.link_return(0)?);
            Ok(Screen {
                text: ctx.context().get_i64("cnt").unwrap_or(0).to_string(),
                links,
            })
        })
        .view("sub", |ctx: &RenderContext<'_>, _: &()| {
            let mut links = BTreeMap::new();
            links.insert("return_5", ctx.link_return(5)?);
            links.insert("goto_main", ctx.link_goto("main", Context::new().with("cnt", 42))?);
            Ok(Screen {
                text: format!("sub {}", ctx.context().get_str("fizz").unwrap_or("")),
                links,
            })
        })
        .action("add_one", |ctx: &mut ActionContext<'_>, _: &()| {
            let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
            ctx.context_mut().insert("cnt", cnt + 1);
            Ok(())
        })
        .action("divide_by_zero", |ctx: &mut ActionContext<'_>, _: &()| {
            let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
            ctx.context_mut().insert("ratio", cnt as f64 / 0.0);
            Ok(())
        })
        .action("double_goto", |ctx: &mut ActionContext<'_>, _: &()| {
            ctx.goto("sub", Context::new())?;
            ctx.goto("main", Context::new())
        })
        .on_return("on_return", move |caller, value, rctx| {
            returns.lock().push((value.clone(), rctx.clone()));
            let cnt = caller.get_i64("cnt").unwrap_or(0);
            caller.insert("cnt", cnt + value.as_i64().unwrap_or(0));
            Ok(())
        })
}

fn navigator(config: NavConfig, returns: Returns) -> Navigator<(), Screen> {
    Navigator::builder(counter_app(returns))
        .config(config)
        .keys(Keys::new(SECRET))
        .entry("main", Context::new().with("cnt", 0))
        .build()
        .unwrap()
}

async fn follow(
    nav: &Navigator<(), Screen>,
    link: &Link,
) -> Result<waystack_runtime::Page<Screen>, NavError> {
    nav.handle(Inbound::with_token(link.token().as_str()), &())
        .await
}

#[tokio::test]
async fn test_counter_scenario() {
    let returns = Returns::default();
    let nav = navigator(NavConfig::default(), returns.clone());

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    assert_eq!(page.origin, PageOrigin::Fresh);
    assert_eq!(page.output.text, "0");

    let page = follow(&nav, &page.output.links["add_one"]).await.unwrap();
    assert_eq!(page.origin, PageOrigin::Resumed);
    assert_eq!(page.output.text, "1");

    let page = follow(&nav, &page.output.links["call_sub"]).await.unwrap();
    assert_eq!(page.view.as_str(), "sub");
    assert_eq!(page.depth, 2);
    assert_eq!(page.output.text, "sub buzz");

    let page = follow(&nav, &page.output.links["return_5"]).await.unwrap();
    assert_eq!(page.view.as_str(), "main");
    assert_eq!(page.depth, 1);
    assert_eq!(page.output.text, "6");

    let returns = returns.lock();
    assert_eq!(returns.len(), 1);
    assert_eq!(
        returns[0],
        (Value::Int(5), Context::new().with("extra", "EXTRA-STUFF"))
    );
}

#[tokio::test]
async fn test_goto_keeps_depth_and_drops_return_linkage() {
    let returns = Returns::default();
    let nav = navigator(NavConfig::default(), returns.clone());

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let page = follow(&nav, &page.output.links["call_sub"]).await.unwrap();
    assert_eq!(page.depth, 2);

    let page = follow(&nav, &page.output.links["goto_main"]).await.unwrap();
    assert_eq!(page.depth, 2);
    assert_eq!(page.output.text, "42");

    let page = follow(&nav, &page.output.links["return"]).await.unwrap();
    assert_eq!(page.depth, 1);
    assert_eq!(page.output.text, "0");
    assert!(returns.lock().is_empty());
}

#[tokio::test]
async fn test_noop_republishes_identical_state() {
    let nav = navigator(NavConfig::default(), Returns::default());

    let first = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let second = follow(&nav, &first.output.links["noop"]).await.unwrap();
    let third = follow(&nav, &second.output.links["noop"]).await.unwrap();

    assert_eq!(first.output.links["noop"], second.output.links["noop"]);
    assert_eq!(second.output.links["noop"], third.output.links["noop"]);
    assert_eq!(third.output.text, "0");
}

/// Letters from a linear congruential generator; they barely compress.
fn incompressible(seed: u64, len: usize) -> String {
    let mut x: u64 = 0x2545_f491 ^ seed.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            char::from(b'a' + ((x >> 33) % 26) as u8)
        })
        .collect()
}

#[tokio::test]
async fn test_oversize_get_token_falls_back_to_post() {
    let nav = Navigator::builder(Registry::<(), Link>::new().view(
        "big",
        |ctx: &RenderContext<'_>, _: &()| ctx.link_noop(),
    ))
    .keys(Keys::new(SECRET))
    .entry("big", Context::new().with("blob", incompressible(1, 4500)))
    .build()
    .unwrap();

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let link = page.output;
    assert!(link.token().as_str().len() > 2000);
    assert_eq!(link.method(), LinkMethod::Post);
    assert!(link.hidden_inputs().contains(link.token().as_str()));

    let resumed = nav
        .handle(Inbound::with_token(link.token().as_str()), &())
        .await
        .unwrap();
    assert_eq!(resumed.origin, PageOrigin::Resumed);
}

#[test]
fn test_eviction_spares_frames_touched_by_the_dispatch() {
    let codec = waystack_core::Codec::default();
    let frame = |seed: usize| {
        Frame::new(
            "sub",
            Context::new()
                .with("seed", seed as i64)
                .with("noise", incompressible(seed as u64, 300)),
        )
    };
    let base: Vec<Frame> = (0..4).map(frame).collect();
    let callee = frame(4);

    let mut top_three = base[2..].to_vec();
    top_three.push(callee.clone());
    let ceiling = codec
        .encode_stack(&CallStack::from_frames(top_three).unwrap())
        .unwrap()
        .len();

    let nav = navigator(
        NavConfig {
            stack_ceiling: Some(ceiling),
            ..NavConfig::default()
        },
        Returns::default(),
    );
    let dispatched: Dispatched = nav
        .dispatch(
            Transfer {
                stack: CallStack::from_frames(base).unwrap(),
                action: Action::Call {
                    view: callee.view.clone(),
                    context: callee.context.clone(),
                    on_return: None,
                    return_context: Context::new(),
                },
            },
            &Context::new(),
            &(),
        )
        .unwrap();
    assert_eq!(dispatched.stack.len(), 5);
    assert_eq!(dispatched.protected, 2);

    let rendered = nav.render(dispatched, None, &()).unwrap();
    assert_eq!(rendered.evicted, 2);
    assert_eq!(rendered.depth, 3);
}

#[tokio::test]
async fn test_tampered_token_starts_fresh() {
    let nav = navigator(NavConfig::default(), Returns::default());
    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let page = follow(&nav, &page.output.links["add_one"]).await.unwrap();
    assert_eq!(page.output.text, "1");

    let token = page.output.links["add_one"].token().as_str().to_string();
    let mut bytes = token.into_bytes();
    bytes[10] = if bytes[10] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();

    let page = nav
        .handle(Inbound::with_token(tampered), &())
        .await
        .unwrap();
    assert_eq!(page.origin, PageOrigin::Reset { reason: "signature" });
    assert_eq!(page.output.text, "0");
}

#[tokio::test]
async fn test_authentic_garbage_is_codec_reset() {
    let nav = navigator(NavConfig::default(), Returns::default());
    let signer = Signer::new(GlobalKey::new(SECRET).unwrap());
    let envelope = signer.seal(b"\x01definitely not deflate", None).unwrap();

    let page = nav
        .handle(Inbound::with_token(encode_wire_token(&envelope)), &())
        .await
        .unwrap();
    assert_eq!(page.origin, PageOrigin::Reset { reason: "codec" });
}

#[tokio::test]
async fn test_per_session_tokens_do_not_cross_sessions() {
    let nav = navigator(
        NavConfig {
            keying: Keying::PerSession,
            ..NavConfig::default()
        },
        Returns::default(),
    );

    let page = nav
        .handle(Inbound::fresh().session("alice"), &())
        .await
        .unwrap();
    let add_one = page.output.links["add_one"].token().as_str().to_string();

    let own = nav
        .handle(Inbound::with_token(add_one.clone()).session("alice"), &())
        .await
        .unwrap();
    assert_eq!(own.output.text, "1");

    let stolen = nav
        .handle(Inbound::with_token(add_one).session("mallory"), &())
        .await
        .unwrap();
    assert_eq!(stolen.origin, PageOrigin::Reset { reason: "signature" });
}

#[tokio::test]
async fn test_encrypted_tokens_round_trip() {
    let nav = Navigator::builder(counter_app(Returns::default()))
        .config(NavConfig {
            encrypt: true,
            ..NavConfig::default()
        })
        .keys(Keys::new(SECRET).with_cipher_key([7u8; 32]))
        .entry("main", Context::new().with("cnt", 0))
        .build()
        .unwrap();

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let page = follow(&nav, &page.output.links["add_one"]).await.unwrap();
    assert_eq!(page.output.text, "1");
}

#[tokio::test]
async fn test_database_backend_reports_purged_state() {
    let store = Arc::new(MemoryBlobStore::new());
    let nav = Navigator::builder(counter_app(Returns::default()))
        .config(NavConfig {
            backend: BackendKind::Database,
            ..NavConfig::default()
        })
        .keys(Keys::new(SECRET))
        .store(store.clone())
        .entry("main", Context::new().with("cnt", 0))
        .build()
        .unwrap();

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    assert_eq!(store.len(), page.output.links.len());

    let add_one = page.output.links["add_one"].clone();
    assert_eq!(add_one.method(), LinkMethod::Get);
    assert_eq!(follow(&nav, &add_one).await.unwrap().output.text, "1");

    assert!(store.delete(add_one.token().as_str()).await.unwrap());
    assert!(matches!(
        follow(&nav, &add_one).await,
        Err(NavError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_programming_errors_surface() {
    let nav = navigator(NavConfig::default(), Returns::default());
    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();

    let empty = follow(&nav, &page.output.links["return"]).await;
    assert!(matches!(empty, Err(NavError::EmptyStack)));

    let double = follow(&nav, &page.output.links["bad_double"]).await;
    assert!(matches!(double, Err(NavError::ProtocolViolation(_))));
}

#[tokio::test]
async fn test_unencodable_context_fails_the_request() {
    let nav = navigator(NavConfig::default(), Returns::default());
    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();

    let err = follow(&nav, &page.output.links["bad_ratio"]).await.unwrap_err();
    assert!(matches!(err, NavError::Codec(_)));
    assert!(err.to_string().contains("`ratio`"), "{err}");

    // The state the failing link came from is still usable.
    let page = follow(&nav, &page.output.links["add_one"]).await.unwrap();
    assert_eq!(page.origin, PageOrigin::Resumed);
    assert_eq!(page.output.text, "1");
}

#[tokio::test]
async fn test_form_fields_merge_before_action() {
    let nav = navigator(NavConfig::default(), Returns::default());
    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let token = page.output.links["add_one"].token().as_str().to_string();

    let page = nav
        .handle(
            Inbound::with_token(token).fields(Context::new().with("cnt", 10)),
            &(),
        )
        .await
        .unwrap();
    assert_eq!(page.output.text, "11");
}
