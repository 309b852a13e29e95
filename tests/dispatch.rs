use std::time::Duration;

use tokio_gen_fsm::{
    Args, ConfigWarning, DelimiterResolver, DispatchError, Event, FsmBuilder, State, args, behavior,
};

#[derive(Debug, Default)]
pub struct Relay {
    forwarded: Vec<(String, usize)>,
    label: String,
}

#[behavior(init = "setup")]
impl Relay {
    fn setup(&mut self, label: String) -> State {
        self.label = label;
        State::from("Idle")
    }

    async fn Idle_Forward(&mut self, payload: String) -> State {
        tokio::task::yield_now().await;
        self.forwarded.push((payload, 1));
        State::from("Busy")
    }

    fn Busy_Peek(&self) -> State {
        State::from("Busy")
    }

    fn Busy_Label(&mut self, text: &str) -> State {
        self.label = text.to_owned();
        State::from("Busy")
    }

    fn Any_Any(&mut self, args: Args) -> (State, Option<Duration>) {
        self.forwarded.push(("fallback".to_owned(), args.len()));
        (State::from("Idle"), None)
    }
}

#[tokio::test]
async fn async_handlers_and_custom_init() {
    let (relay, task) =
        tokio_gen_fsm::start(Relay::default(), args![String::from("relay-1")]).unwrap();

    relay
        .send_event("Forward", args![String::from("hello")])
        .await
        .unwrap();
    relay.send_event("Peek", args![]).await.unwrap();
    assert_eq!(relay.current_state_exact().await.unwrap(), "Busy");

    relay.stop().await.unwrap();
    let relay = task.await.unwrap();
    assert_eq!(relay.label, "relay-1");
    assert_eq!(relay.forwarded, [("hello".to_owned(), 1)]);
}

#[tokio::test]
async fn borrowed_parameters_are_not_invocable() {
    let (relay, _task) =
        tokio_gen_fsm::start(Relay::default(), args![String::from("relay-1")]).unwrap();

    assert_eq!(
        relay.warnings(),
        [ConfigWarning::NotInvocable {
            name: "Busy_Label".into()
        }]
    );
    assert!(
        !relay
            .handlers()
            .contains(&(State::from("Busy"), Event::from("Label")))
    );
}

#[tokio::test]
async fn unmatched_events_go_to_the_generic_handler() {
    let (relay, task) =
        tokio_gen_fsm::start(Relay::default(), args![String::from("relay-1")]).unwrap();

    relay
        .send_event("Forward", args![String::from("hello")])
        .await
        .unwrap();
    relay
        .send_event("Whatever", args![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(relay.current_state_exact().await.unwrap(), "Idle");

    relay.next_outcome().await.unwrap().unwrap();
    let fallback = relay.next_outcome().await.unwrap().unwrap();
    assert_eq!(fallback.handler, "Any_Any");
    assert_eq!(fallback.event, "Whatever");
    assert_eq!(fallback.from, "Busy");

    relay.stop().await.unwrap();
    let relay = task.await.unwrap();
    assert_eq!(relay.forwarded[1], ("fallback".to_owned(), 3));
}

#[derive(Debug, Default)]
pub struct Turnstile {
    coins: u32,
}

#[behavior]
impl Turnstile {
    fn init(&mut self) -> State {
        State::from("Locked")
    }

    fn Locked__Coin(&mut self, value: u32) -> State {
        self.coins += value;
        State::from("Unlocked")
    }

    fn Unlocked__Push(&mut self) -> State {
        State::from("Locked")
    }

    fn Locked_Push(&mut self) -> State {
        State::from("Broken")
    }
}

#[tokio::test]
async fn custom_delimiter_resolver() {
    let (turnstile, task) = FsmBuilder::new()
        .resolver(DelimiterResolver::new("__"))
        .start(Turnstile::default(), args![])
        .unwrap();

    assert_eq!(
        turnstile.handlers(),
        [
            (State::from("Locked"), Event::from("Coin")),
            (State::from("Unlocked"), Event::from("Push")),
        ]
    );

    turnstile.send_event("Push", args![]).await.unwrap();
    turnstile.send_event("Coin", args![25u32]).await.unwrap();
    turnstile.send_event("Push", args![]).await.unwrap();
    assert_eq!(turnstile.current_state_exact().await.unwrap(), "Locked");

    turnstile.stop().await.unwrap();
    assert_eq!(task.await.unwrap().coins, 25);
}

#[tokio::test]
async fn full_outcome_outbox_never_blocks_dispatch() {
    let (turnstile, _task) = FsmBuilder::new()
        .resolver(DelimiterResolver::new("__"))
        .outcome_capacity(1)
        .start(Turnstile::default(), args![])
        .unwrap();

    for _ in 0..5 {
        turnstile.send_event("Kick", args![]).await.unwrap();
    }
    turnstile.send_event("Coin", args![5u32]).await.unwrap();
    turnstile.wait().await.unwrap();
    assert_eq!(turnstile.current_state(), "Unlocked");

    assert!(matches!(
        turnstile.try_next_outcome(),
        Some(Err(DispatchError::Resolution { .. }))
    ));
    assert!(turnstile.try_next_outcome().is_none());
}

#[tokio::test]
async fn try_send_reports_a_full_inbox() {
    let (turnstile, _task) = FsmBuilder::new()
        .event_capacity(1)
        .start(Turnstile::default(), args![])
        .unwrap();

    let mut full = false;
    for _ in 0..64 {
        if let Err(err) = turnstile.try_send_event("Kick", args![]) {
            assert!(matches!(err, tokio_gen_fsm::FsmError::Full));
            full = true;
            break;
        }
    }
    assert!(full);
}

#[derive(Debug, Default)]
pub struct Worker {
    done: u64,
}

#[behavior]
impl Worker {
    fn init(&mut self) -> State {
        State::from("Idle")
    }

    async fn Idle_Work(&mut self) -> State {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.done += 1;
        State::from("Idle")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn barrier_answers_under_a_steady_producer() {
    let (worker, task) = tokio_gen_fsm::start(Worker::default(), args![]).unwrap();

    let producer = worker.clone();
    let feeding = tokio::spawn(async move {
        let mut sent = 0u64;
        while producer.send_event("Work", args![]).await.is_ok() {
            sent += 1;
        }
        sent
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let answered = tokio::time::timeout(Duration::from_secs(2), worker.wait()).await;
    assert!(matches!(answered, Ok(Ok(()))));
    let state = tokio::time::timeout(Duration::from_secs(2), worker.current_state_exact()).await;
    assert!(matches!(state, Ok(Ok(ref state)) if state == "Idle"));

    worker.stop_immediate().await.unwrap();
    let sent = feeding.await.unwrap();
    let worker = task.await.unwrap();
    assert!(worker.done > 0);
    assert!(worker.done <= sent);
}
