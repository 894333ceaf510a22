// Demo binary - assembles a small net in plain Rust and drives it to
// completion, without any network/GraphQL surface.
//
// Run with: cargo run --bin run_net -- --tokens 3

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use petri_engine::net::{always_fatal, Arc as NetArc, ExecutorOutput, Place, PlaceId, Transition, TransitionId};
use petri_engine::token::Token;
use petri_engine::{ColoredMarking, Event, InMemoryJournal, Instance, InstanceConfig, Net};
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Run a small doubling net to demonstrate the engine")]
struct Args {
    /// How many input tokens to seed place `in` with.
    #[arg(long, default_value_t = 3)]
    tokens: i64,
}

const IN: PlaceId = PlaceId(1);
const OUT: PlaceId = PlaceId(2);
const DOUBLE: TransitionId = TransitionId(1);

fn build_net() -> Net {
    let doubling = Transition::new(
        1,
        "double",
        true, // automated: the scheduler fires this on its own
        always_fatal(),
        Arc::new(|input| {
            Box::pin(async move {
                let n = input.fields["in"][0].value().as_i64().unwrap_or(0);
                let mut fields = std::collections::HashMap::new();
                fields.insert("out".to_string(), vec![Token::new(json!(n * 2))]);
                Ok(ExecutorOutput {
                    fields,
                    event: json!({"doubled": n}),
                })
            })
        }),
    );

    Net::new(
        vec![Place::new(1, "in", "number"), Place::new(2, "out", "number")],
        vec![doubling],
        vec![
            NetArc::input(IN, DOUBLE, 1, "in"),
            NetArc::output(DOUBLE, OUT, 1, "out"),
        ],
    )
    .expect("net topology is internally consistent")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let net = Arc::new(build_net());
    let journal = Arc::new(InMemoryJournal::new());
    let config = InstanceConfig::from_env().unwrap_or_default();

    let (instance, _join) = Instance::spawn(net, journal, "demo-1", config)
        .await
        .expect("journal replay does not fail for a fresh instance");

    let mut events = instance.subscribe();

    let seed: Vec<Token> = (0..args.tokens).map(|n| Token::new(json!(n))).collect();
    info!(tokens = args.tokens, "seeding input place");
    instance
        .initialize(ColoredMarking::single(IN, seed), json!({"demo": "run_net"}))
        .await
        .expect("mailbox is alive");

    // The scheduler fires `double` automatically as soon as it's enabled;
    // watch the event feed until every seeded token has been doubled.
    let mut fired = 0i64;
    while fired < args.tokens {
        match events.next().await {
            Some(Ok(Event::TransitionFired { event_payload, .. })) => {
                fired += 1;
                info!(%event_payload, fired, of = args.tokens, "transition fired");
            }
            Some(Ok(Event::TransitionFailed { error_message, .. })) => {
                info!(error_message, "transition failed");
            }
            Some(Ok(Event::Initialized { .. })) => {}
            Some(Err(err)) => {
                info!(%err, "event subscriber lagged, some events were missed");
            }
            None => break,
        }
    }

    match instance.get_state().await.expect("mailbox is alive") {
        petri_engine::instance::Response::ProcessState { sequence_no, marking, .. } => {
            info!(sequence_no, out = ?marking.tokens_at(OUT), "final state");
        }
        other => info!(?other, "unexpected response"),
    }

    instance.shutdown();
}
