//! Example: a code lock that opens on the right digits and relocks itself.
//!
//! Run with `cargo run --example door`.

use std::time::Duration;

use tokio_gen_fsm::{FsmError, State, args, behavior};

const OPEN_FOR: Duration = Duration::from_millis(300);

#[derive(Debug, Default)]
pub struct Door {
    code: String,
    so_far: String,
}

#[behavior]
impl Door {
    fn init(&mut self, code: String) -> State {
        self.code = code;
        State::from("Locked")
    }

    fn Locked_Button(&mut self, digit: char) -> (State, Option<Duration>) {
        self.so_far.push(digit);
        if self.so_far == self.code {
            self.so_far.clear();
            println!("door: correct code, opening for {OPEN_FOR:?}");
            return (State::from("Open"), Some(OPEN_FOR));
        }
        if self.so_far.len() >= self.code.len() {
            println!("door: wrong code {:?}", self.so_far);
            self.so_far.clear();
        }
        (State::from("Locked"), None)
    }

    fn Open_Timeout(&mut self) -> State {
        println!("door: timeout, locking");
        State::from("Locked")
    }
}

#[tokio::main]
async fn main() -> Result<(), FsmError> {
    let (door, task) = tokio_gen_fsm::start(Door::default(), args![String::from("1234")])?;
    println!("door: {}", door.current_state());

    for digit in "0000".chars().chain("1234".chars()) {
        door.send_event("Button", args![digit]).await?;
    }
    println!("door: {}", door.current_state_exact().await?);
    while door.try_next_outcome().is_some() {}

    door.send_event("Button", args!['9']).await?;
    if let Some(Err(err)) = door.next_outcome().await {
        println!("door: ignored ({err})");
    }

    tokio::time::sleep(OPEN_FOR * 2).await;
    println!("door: {}", door.current_state_exact().await?);

    door.stop().await?;
    let door = task.await?;
    println!("door: stopped with {:?} pending", door.so_far);
    Ok(())
}
