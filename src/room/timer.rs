use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Clock task handles for one room: the one-shot turn deadline and the ~1 Hz
/// countdown broadcast loop. Owned by the room and manipulated only under
/// its lock; arming replaces (and cancels) whatever was armed before.
#[derive(Debug, Default)]
pub struct TurnTimer {
    deadline_task: Option<JoinHandle<()>>,
    tick_token: Option<CancellationToken>,
}

impl TurnTimer {
    /// Install the one-shot deadline task for the turn being started,
    /// disarming the previous turn's task.
    pub fn arm_deadline(&mut self, task: JoinHandle<()>) {
        self.cancel_deadline();
        self.deadline_task = Some(task);
    }

    pub fn cancel_deadline(&mut self) {
        if let Some(task) = self.deadline_task.take() {
            task.abort();
        }
    }

    /// Install the tick loop's cancellation token for the running match.
    pub fn set_tick(&mut self, token: CancellationToken) {
        self.stop_tick();
        self.tick_token = Some(token);
    }

    pub fn stop_tick(&mut self) {
        if let Some(token) = self.tick_token.take() {
            token.cancel();
        }
    }

    /// Cancel everything; used on terminal transitions and room closure.
    pub fn cancel_all(&mut self) {
        self.cancel_deadline();
        self.stop_tick();
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
