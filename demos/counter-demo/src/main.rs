//! # Counter Demo - Call/Return Navigation over HTTP
//!
//! `main` shows a counter. Its links add one, or *call* `amount`, a page that
//! asks for a number and *returns* it. The return handler adds the number to
//! the counter. All state rides in signed tokens; the server keeps nothing.
//!
//! ```bash
//! WAYSTACK_SECRET=$(cargo run -q -p waystack-cli -- keygen) cargo run -p counter-demo
//! ```
//!
//! Optional: `WAYSTACK_CONFIG=waystack.toml`, plus any `WAYSTACK_*` override.

use anyhow::Context as _;
use waystack::prelude::*;
use waystack::runtime::link::escape_html;

const DEV_SECRET: &str = "counter-demo-development-secret";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1>{body}</body></html>"
    )
}

/// An anchor for GET links, a one-button form for POST links.
fn control(link: &Link, label: &str) -> String {
    match link.method() {
        LinkMethod::Get => format!("<a href=\"{}\">{label}</a>", escape_html(&link.href("/"))),
        LinkMethod::Post => format!(
            "<form method=\"post\" action=\"/\">{}<button>{label}</button></form>",
            link.hidden_inputs()
        ),
    }
}

fn main_page(ctx: &RenderContext<'_>, _req: &Parts) -> NavResult<String> {
    let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
    let add_one = ctx.link_action("add_one", Context::new())?;
    let ask = ctx.link_call(
        "amount",
        Context::new().with("prompt", "How much should be added?"),
        Some("add_returned".into()),
        Context::new().with("asked_at_depth", ctx.depth() as i64),
    )?;
    let about = ctx.link_goto("about", Context::new().with("cnt", cnt))?;

    Ok(layout(
        "Counter",
        &format!(
            "<p>Count: <strong>{cnt}</strong> (depth {})</p><ul><li>{}</li><li>{}</li><li>{}</li></ul>",
            ctx.depth(),
            control(&add_one, "Add one"),
            control(&ask, "Add an amount..."),
            control(&about, "About"),
        ),
    ))
}

fn amount_page(ctx: &RenderContext<'_>, _req: &Parts) -> NavResult<String> {
    let prompt = ctx.context().get_str("prompt").unwrap_or("Amount");
    let submit = ctx.link_action("submit_amount", Context::new())?;
    let cancel = ctx.link_return(0)?;

    Ok(layout(
        "Amount",
        &format!(
            "<form method=\"post\" action=\"/\">{}<label>{} <input name=\"amount\" value=\"5\"></label>\
             <button>Return it</button></form><p>{}</p>",
            submit.hidden_inputs(),
            escape_html(prompt),
            control(&cancel, "Cancel"),
        ),
    ))
}

fn about_page(ctx: &RenderContext<'_>, _req: &Parts) -> NavResult<String> {
    let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
    let back = ctx.link_goto("main", Context::new().with("cnt", cnt))?;
    Ok(layout(
        "About",
        &format!(
            "<p>Each link carries the whole call stack, signed.</p><p>{}</p>",
            control(&back, "Back to the counter")
        ),
    ))
}

fn registry() -> Registry<Parts, String> {
    Registry::new()
        .view("main", main_page)
        .view("amount", amount_page)
        .view("about", about_page)
        .action("add_one", |ctx: &mut ActionContext<'_>, _req: &Parts| {
            let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
            ctx.context_mut().insert("cnt", cnt + 1);
            Ok(())
        })
        .action("submit_amount", |ctx: &mut ActionContext<'_>, _req: &Parts| {
            let amount = ctx
                .context()
                .get_str("amount")
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .unwrap_or(0);
            ctx.ret(amount)
        })
        .on_return("add_returned", |caller, value, rctx| {
            let cnt = caller.get_i64("cnt").unwrap_or(0);
            caller.insert("cnt", cnt + value.as_i64().unwrap_or(0));
            tracing::info!(
                returned = ?value,
                asked_at_depth = ?rctx.get_i64("asked_at_depth"),
                "amount returned to counter"
            );
            Ok(())
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    waystack::core::telemetry::init_stdout_tracing();

    let config = match std::env::var("WAYSTACK_CONFIG") {
        Ok(path) => NavConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        Err(_) => NavConfig::default(),
    }
    .with_env_overrides()?;

    let secret = std::env::var("WAYSTACK_SECRET").unwrap_or_else(|_| {
        tracing::warn!("WAYSTACK_SECRET not set, using the built-in development secret");
        DEV_SECRET.to_string()
    });

    let mut builder = Navigator::builder(registry())
        .config(config.clone())
        .keys(Keys::new(secret.into_bytes()))
        .entry("main", Context::new().with("cnt", 0));
    if config.backend == BackendKind::Database {
        builder = builder.store(std::sync::Arc::new(MemoryBlobStore::new()));
    }
    let navigator = builder.build()?;

    Waystack::http(navigator)
        .bind("127.0.0.1:3000")
        .run()
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
