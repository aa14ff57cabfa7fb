use crate::tui::TuiMsg;
use std::time::Duration;
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(80);
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Forward terminal input and spinner ticks into the UI mailbox until
/// `cancel` fires.
pub fn spawn_tui_feeders(tx: mpsc::Sender<TuiMsg>, cancel: CancellationToken) {
    let tx_in = tx.clone();
    let cancel_in = cancel.clone();
    // One blocking thread polls crossterm so a cancelled UI is noticed
    // within INPUT_POLL even with no keypress.
    tokio::task::spawn_blocking(move || {
        while !cancel_in.is_cancelled() {
            match crossterm::event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    let _ = tx_in.blocking_send(TuiMsg::OpError(format!("input: {e}")));
                    break;
                }
            }
            let msg = match crossterm::event::read() {
                Ok(ev) => TuiMsg::InputEvent(ev),
                Err(e) => TuiMsg::OpError(format!("input: {e}")),
            };
            if tx_in.blocking_send(msg).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = time::interval(TICK);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if tx.is_closed() {
                        break;
                    }
                    let _ = tx.try_send(TuiMsg::Tick);
                }
            }
        }
    });
}
