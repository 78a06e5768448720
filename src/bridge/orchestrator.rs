//! Bridge orchestrator that ties the game server and Signal together.
//!
//! Runs three polling loops against shared state:
//! - game chat -> Signal group
//! - Signal (group chat, group commands, direct-message commands) -> game
//! - roster polling for join/leave/death announcements
//!
//! The state lock is taken per processed item and never held across a
//! network call.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::BackoffBuilder;
use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::common::error::ApiResult;
use crate::common::messages::{InboundChatMessage, InboundGameMessage};
use crate::common::types::GameMessageKind;
use crate::config::types::Config;
use crate::signal::resolver::MessageResolver;

use super::presence::{is_join_leave, SystemNotice};
use super::sources::{ChatPlatform, CommandHandler, GameFeed};
use super::state::BridgeState;

const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Pause between Signal long polls; the poll itself does the waiting.
const SIGNAL_POLL_PAUSE: Duration = Duration::from_millis(100);

/// Retry delay for failed loop iterations.
/// Fixed 1s, unlimited retries.
fn loop_backoff() -> impl Iterator<Item = Duration> {
    backon::ConstantBuilder::default()
        .with_delay(RETRY_DELAY)
        .without_max_times()
        .build()
}

/// Settings the orchestrator reads; fixed after startup.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Sender name the bridge itself uses in game chat.
    pub bot_name: String,
    pub command_prefix: String,
    /// Whether a Signal group is bridged. Without one only DMs are served.
    pub group_enabled: bool,
    pub poll_timeout: Duration,
    pub game_poll_interval: Duration,
    pub presence_interval: Duration,
    pub debounce: Duration,
    pub seen_capacity: usize,
    pub sent_capacity: usize,
}

impl BridgeSettings {
    pub fn from_config(config: &Config) -> Self {
        let bridge = &config.bridge;
        Self {
            bot_name: bridge.bot_name.clone(),
            command_prefix: bridge.command_prefix.clone(),
            group_enabled: config.signal.group_id.is_some(),
            poll_timeout: bridge.poll_timeout(),
            game_poll_interval: bridge.game_poll_interval(),
            presence_interval: bridge.presence_interval(),
            debounce: bridge.debounce(),
            seen_capacity: bridge.seen_capacity,
            sent_capacity: bridge.sent_capacity,
        }
    }
}

/// The main bridge that orchestrates message flow.
pub struct Bridge {
    game: Arc<dyn GameFeed>,
    chat: Arc<dyn ChatPlatform>,
    commands: Arc<dyn CommandHandler>,
    resolver: MessageResolver,
    settings: BridgeSettings,
    state: Mutex<BridgeState>,
}

impl Bridge {
    pub fn new(
        game: Arc<dyn GameFeed>,
        chat: Arc<dyn ChatPlatform>,
        commands: Arc<dyn CommandHandler>,
        settings: BridgeSettings,
    ) -> Self {
        let state = BridgeState::new(
            settings.seen_capacity,
            settings.sent_capacity,
            settings.debounce,
        );

        Self {
            game,
            chat,
            commands,
            resolver: MessageResolver::new(),
            settings,
            state: Mutex::new(state),
        }
    }

    /// Start the watermark at the newest line already in the game feed so
    /// history is not replayed into Signal.
    pub async fn initialize_watermark(&self) {
        match self.game.poll_chat_messages().await {
            Ok(messages) => {
                let newest = messages
                    .iter()
                    .map(|m| m.server_timestamp)
                    .fold(0.0_f64, f64::max);
                let mut state = self.state.lock().await;
                state.advance_watermark(newest);
                info!("Initialized game chat watermark to {}", state.watermark);
            }
            Err(e) => warn!(error = %e, "Could not read game chat; starting from empty watermark"),
        }
    }

    // ============================================================
    // Game -> Signal
    // ============================================================

    /// Poll game chat once and relay new lines. Returns how many were sent.
    pub async fn poll_game_chat(&self) -> ApiResult<usize> {
        let messages = self.game.poll_chat_messages().await?;

        let fresh: Vec<InboundGameMessage> = {
            let mut state = self.state.lock().await;
            let watermark = state.watermark;
            let fresh: Vec<InboundGameMessage> = messages
                .into_iter()
                .filter(|m| m.server_timestamp > watermark)
                .collect();
            if let Some(newest) = fresh.iter().map(|m| m.server_timestamp).reduce(f64::max) {
                state.advance_watermark(newest);
            }
            fresh
        };

        if !fresh.is_empty() {
            debug!("Received {} new game chat messages", fresh.len());
        }

        let mut relayed = 0;
        for msg in &fresh {
            let Some(text) = self.process_game_message(msg).await else {
                continue;
            };

            match self.chat.send_group_message(&text).await {
                Ok(()) => {
                    info!("Game -> Signal: {}", text);
                    relayed += 1;
                }
                Err(e) => warn!(error = %e, "Dropped game message for Signal: {}", text),
            }
        }

        Ok(relayed)
    }

    /// Decide what, if anything, a game line becomes in Signal.
    async fn process_game_message(&self, msg: &InboundGameMessage) -> Option<String> {
        if msg.sender == self.settings.bot_name {
            return None;
        }

        let mut state = self.state.lock().await;

        if state.sent_to_game.consume_echo(&msg.sender, &msg.text) {
            debug!(sender = %msg.sender, "Suppressed echo of bridged message");
            return None;
        }

        // Join/leave lines are never relayed verbatim, even when no player resolves.
        if msg.kind == GameMessageKind::System && is_join_leave(&msg.text) {
            let Some(notice) = SystemNotice::parse(&msg.sender, &msg.text) else {
                debug!(text = %msg.text, "Suppressed join/leave notice without a player");
                return None;
            };
            let confirmed = state.presence.confirm(&notice);
            if confirmed.is_none() {
                debug!(player = %notice.player, "Suppressed unmatched join/leave notice");
            }
            return confirmed.map(|event| event.announcement());
        }
        drop(state);

        Some(
            self.resolver
                .compose_outbound_to_chat(&msg.text, &msg.sender, msg.kind),
        )
    }

    // ============================================================
    // Signal -> Game
    // ============================================================

    /// Poll Signal once and handle every new message. Returns how many were handled.
    pub async fn poll_chat_messages(&self) -> ApiResult<usize> {
        let messages = self.chat.poll_messages(self.settings.poll_timeout).await?;

        let mut handled = 0;
        for msg in messages {
            if self.handle_chat_message(&msg).await {
                handled += 1;
            }
        }
        Ok(handled)
    }

    async fn handle_chat_message(&self, msg: &InboundChatMessage) -> bool {
        if self.state.lock().await.seen.has_seen(msg.timestamp) {
            debug!(timestamp = msg.timestamp, "Skipping already handled message");
            return false;
        }

        let done = if !msg.is_group {
            self.handle_direct_message(msg).await
        } else if self.chat.is_our_group(msg.group_id.as_deref()) {
            self.handle_group_message(msg).await
        } else {
            debug!(group = ?msg.group_id, "Ignoring message from another group");
            true
        };

        // Only a finished message counts as seen.
        if done {
            self.state.lock().await.seen.mark_seen(msg.timestamp);
        }
        done
    }

    async fn handle_group_message(&self, msg: &InboundChatMessage) -> bool {
        self.acknowledge(msg).await;

        if let Some(command) = msg.text.strip_prefix(self.settings.command_prefix.as_str()) {
            info!(sender = %msg.sender, "Group command: {}", msg.text);
            let reply = self.commands.handle(command).await;
            return match self.chat.send_group_message(&reply).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Dropped command reply to group");
                    false
                }
            };
        }

        let text = self.resolver.compose_outbound_to_game(
            &msg.text,
            &msg.attachments,
            msg.has_sticker,
            &msg.mentions,
        );
        if text.is_empty() {
            debug!(sender = %msg.sender, "Nothing to send to game");
            return true;
        }

        // Register before sending: the echo can arrive before the send returns.
        let label = self.game.sender_label(&msg.sender);
        self.state.lock().await.sent_to_game.mark_sent(&label, &text);

        match self.game.send_chat_message(&text, &msg.sender).await {
            Ok(()) => {
                info!("Signal -> Game: [{}] {}", msg.sender, text);
                true
            }
            Err(e) => {
                self.state.lock().await.sent_to_game.retract(&label, &text);
                warn!(error = %e, sender = %msg.sender, "Dropped Signal message for game: {}", text);
                false
            }
        }
    }

    async fn handle_direct_message(&self, msg: &InboundChatMessage) -> bool {
        info!(sender = %msg.sender, "DM: {}", msg.text);
        self.acknowledge(msg).await;

        let reply = self.commands.handle(&msg.text).await;
        let recipient = msg.sender_id.as_deref().unwrap_or(&msg.sender);

        match self.chat.send_direct_message(&reply, recipient).await {
            Ok(()) => {
                debug!(recipient = %recipient, "DM reply sent");
                true
            }
            Err(e) => {
                warn!(error = %e, recipient = %recipient, "Dropped DM reply");
                false
            }
        }
    }

    async fn acknowledge(&self, msg: &InboundChatMessage) {
        if let Some(ref sender_id) = msg.sender_id {
            if let Err(e) = self.chat.send_read_receipt(sender_id, msg.timestamp).await {
                debug!(error = %e, "Read receipt failed");
            }
        }
    }

    // ============================================================
    // Presence
    // ============================================================

    /// Poll the roster once and announce due presence events.
    pub async fn poll_player_events(&self) -> ApiResult<usize> {
        self.poll_player_events_at(Instant::now()).await
    }

    pub(crate) async fn poll_player_events_at(&self, now: Instant) -> ApiResult<usize> {
        let roster = self.game.poll_roster().await?;
        let events = self.state.lock().await.presence.observe_roster(&roster, now);

        let mut announced = 0;
        for event in events {
            let text = event.announcement();
            match self.chat.send_group_message(&text).await {
                Ok(()) => {
                    info!("Presence -> Signal: {}", text);
                    announced += 1;
                }
                Err(e) => warn!(error = %e, "Dropped presence announcement: {}", text),
            }
        }
        Ok(announced)
    }

    // ============================================================
    // Loops
    // ============================================================

    /// Run all loops until `shutdown` flips to true.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let mut loops: Vec<BoxFuture<'_, ()>> = vec![run_polling_loop(
            "Signal",
            SIGNAL_POLL_PAUSE,
            shutdown.clone(),
            move || self.poll_chat_messages(),
        )
        .boxed()];

        if self.settings.group_enabled {
            loops.push(
                run_polling_loop(
                    "Game chat",
                    self.settings.game_poll_interval,
                    shutdown.clone(),
                    move || self.poll_game_chat(),
                )
                .boxed(),
            );
            loops.push(
                run_polling_loop(
                    "Presence",
                    self.settings.presence_interval,
                    shutdown.clone(),
                    move || self.poll_player_events(),
                )
                .boxed(),
            );
        } else {
            info!("No Signal group configured - running in DM-only mode");
        }

        join_all(loops).await;
        info!("Bridge stopped");
    }
}

/// Drive `iteration` until shutdown. Failures wait the retry delay;
/// a success waits `pause`.
async fn run_polling_loop<F, Fut>(
    name: &'static str,
    pause: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut iteration: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<usize>>,
{
    info!("{} loop started", name);
    let mut backoff = loop_backoff();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delay = match iteration().await {
            Ok(_) => pause,
            Err(e) => {
                let delay = backoff.next().unwrap_or(RETRY_DELAY);
                warn!(
                    error = %e,
                    "{} loop iteration failed, retrying in {:.1}s",
                    name,
                    delay.as_secs_f64()
                );
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("{} loop stopped", name);
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::common::error::ApiError;
    use crate::common::messages::{Attachment, PlayerStatus};

    const GROUP: &str = "internal-group-id";

    // ------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------

    #[derive(Default)]
    struct FakeGame {
        feed: StdMutex<Vec<InboundGameMessage>>,
        rosters: StdMutex<VecDeque<Vec<PlayerStatus>>>,
        sent: StdMutex<Vec<(String, String)>>,
        fail_sends: StdMutex<bool>,
        polls: StdMutex<usize>,
    }

    impl FakeGame {
        fn push(&self, ts: f64, sender: &str, kind: GameMessageKind, text: &str) {
            self.feed.lock().unwrap().push(InboundGameMessage {
                local_timestamp: ts as i64,
                server_timestamp: ts,
                sender: sender.to_string(),
                kind,
                text: text.to_string(),
            });
        }

        fn queue_roster(&self, names: &[&str]) {
            self.rosters
                .lock()
                .unwrap()
                .push_back(names.iter().map(|n| PlayerStatus::alive(*n)).collect());
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GameFeed for FakeGame {
        async fn poll_chat_messages(&self) -> ApiResult<Vec<InboundGameMessage>> {
            *self.polls.lock().unwrap() += 1;
            Ok(self.feed.lock().unwrap().clone())
        }

        async fn poll_roster(&self) -> ApiResult<Vec<PlayerStatus>> {
            *self.polls.lock().unwrap() += 1;
            Ok(self.rosters.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn send_chat_message(&self, text: &str, sender: &str) -> ApiResult<()> {
            if *self.fail_sends.lock().unwrap() {
                return Err(ApiError::Rejected {
                    endpoint: "sendChatMessage".to_string(),
                    reason: "test".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((sender.to_string(), text.to_string()));
            Ok(())
        }

        fn is_online(&self) -> bool {
            true
        }

        fn last_error(&self) -> String {
            String::new()
        }

        fn sender_label(&self, sender: &str) -> String {
            sender.chars().take(32).collect()
        }
    }

    #[derive(Default)]
    struct FakeChat {
        inbox: StdMutex<VecDeque<Vec<InboundChatMessage>>>,
        group_sent: StdMutex<Vec<String>>,
        dm_sent: StdMutex<Vec<(String, String)>>,
        receipts: StdMutex<Vec<(String, i64)>>,
    }

    impl FakeChat {
        fn deliver(&self, batch: Vec<InboundChatMessage>) {
            self.inbox.lock().unwrap().push_back(batch);
        }

        fn group_sent(&self) -> Vec<String> {
            self.group_sent.lock().unwrap().clone()
        }

        fn dm_sent(&self) -> Vec<(String, String)> {
            self.dm_sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatPlatform for FakeChat {
        async fn poll_messages(&self, _timeout: Duration) -> ApiResult<Vec<InboundChatMessage>> {
            Ok(self.inbox.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn send_group_message(&self, text: &str) -> ApiResult<()> {
            self.group_sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_direct_message(&self, text: &str, recipient: &str) -> ApiResult<()> {
            self.dm_sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }

        fn is_our_group(&self, group_id: Option<&str>) -> bool {
            group_id == Some(GROUP)
        }

        async fn send_read_receipt(&self, recipient: &str, timestamp: i64) -> ApiResult<()> {
            self.receipts
                .lock()
                .unwrap()
                .push((recipient.to_string(), timestamp));
            Ok(())
        }
    }

    #[derive(Default)]
    struct EchoCommands {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandHandler for EchoCommands {
        async fn handle(&self, text: &str) -> String {
            self.calls.lock().unwrap().push(text.to_string());
            format!("reply to '{}'", text)
        }
    }

    struct Harness {
        game: Arc<FakeGame>,
        chat: Arc<FakeChat>,
        commands: Arc<EchoCommands>,
        bridge: Bridge,
    }

    fn settings() -> BridgeSettings {
        BridgeSettings::from_config(&{
            let mut config = Config::default();
            config.signal.group_id = Some("group.aW50ZXJuYWw=".to_string());
            config
        })
    }

    fn harness() -> Harness {
        let game = Arc::new(FakeGame::default());
        let chat = Arc::new(FakeChat::default());
        let commands = Arc::new(EchoCommands::default());
        let bridge = Bridge::new(game.clone(), chat.clone(), commands.clone(), settings());
        Harness {
            game,
            chat,
            commands,
            bridge,
        }
    }

    fn group_msg(timestamp: i64, sender: &str, text: &str) -> InboundChatMessage {
        InboundChatMessage {
            sender: sender.to_string(),
            sender_id: Some(format!("uuid-{}", sender.to_lowercase())),
            text: text.to_string(),
            timestamp,
            group_id: Some(GROUP.to_string()),
            is_group: true,
            ..Default::default()
        }
    }

    fn direct_msg(timestamp: i64, sender: &str, text: &str) -> InboundChatMessage {
        InboundChatMessage {
            sender: sender.to_string(),
            sender_id: Some(format!("uuid-{}", sender.to_lowercase())),
            text: text.to_string(),
            timestamp,
            ..Default::default()
        }
    }

    // ------------------------------------------------------------
    // Game -> Signal
    // ------------------------------------------------------------

    #[tokio::test]
    async fn test_watermark_skips_history() {
        let h = harness();
        h.game.push(1.0, "Alice", GameMessageKind::Player, "old news");
        h.bridge.initialize_watermark().await;

        h.game.push(2.0, "Alice", GameMessageKind::Player, "fresh :tada:");
        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 1);
        assert_eq!(h.chat.group_sent(), vec!["[Alice] fresh 🎉".to_string()]);

        // Nothing new on the next poll.
        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 0);
        assert_eq!(h.chat.group_sent().len(), 1);
    }

    #[tokio::test]
    async fn test_bot_messages_dropped() {
        let h = harness();
        h.game.push(1.0, "SignalBot", GameMessageKind::Player, "hi");
        h.game.push(2.0, "Ada", GameMessageKind::Ada, "Hello, Pioneer.");

        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 1);
        assert_eq!(h.chat.group_sent(), vec!["[A.D.A.] Hello, Pioneer.".to_string()]);
    }

    #[tokio::test]
    async fn test_other_system_messages_forwarded() {
        let h = harness();
        h.game.push(1.0, "Server", GameMessageKind::System, "Autosave complete");

        h.bridge.poll_game_chat().await.unwrap();
        assert_eq!(h.chat.group_sent(), vec!["[System] Autosave complete".to_string()]);
    }

    #[tokio::test]
    async fn test_unmatched_join_notice_suppressed() {
        let h = harness();
        h.game
            .push(1.0, "Bob", GameMessageKind::System, "<PlayerName/> has joined the game!");

        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 0);
        assert!(h.chat.group_sent().is_empty());
    }

    #[tokio::test]
    async fn test_join_notice_without_player_suppressed() {
        let h = harness();
        h.game
            .push(1.0, "", GameMessageKind::System, "<PlayerName/> has joined the game!");
        h.game
            .push(2.0, " ", GameMessageKind::System, "has left the game");

        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 0);
        assert!(h.chat.group_sent().is_empty());
    }

    #[tokio::test]
    async fn test_system_notice_confirms_pending_leave() {
        let h = harness();
        let t0 = Instant::now();

        h.game.queue_roster(&["Dave"]);
        h.game.queue_roster(&[]);
        h.bridge.poll_player_events_at(t0).await.unwrap();
        h.bridge
            .poll_player_events_at(t0 + Duration::from_secs(5))
            .await
            .unwrap();
        assert!(h.chat.group_sent().is_empty());

        h.game
            .push(1.0, "Dave", GameMessageKind::System, "<PlayerName/> has left the game!");
        h.bridge.poll_game_chat().await.unwrap();
        assert_eq!(h.chat.group_sent(), vec!["[Server] Dave left the game".to_string()]);

        // No second announcement once the window passes.
        h.game.queue_roster(&[]);
        h.bridge
            .poll_player_events_at(t0 + Duration::from_secs(90))
            .await
            .unwrap();
        assert_eq!(h.chat.group_sent().len(), 1);
    }

    #[tokio::test]
    async fn test_debounced_join_announced() {
        let h = harness();
        let t0 = Instant::now();

        h.game.queue_roster(&[]);
        h.game.queue_roster(&["Charlie"]);
        h.game.queue_roster(&["Charlie"]);
        h.bridge.poll_player_events_at(t0).await.unwrap();
        h.bridge
            .poll_player_events_at(t0 + Duration::from_secs(1))
            .await
            .unwrap();
        let announced = h
            .bridge
            .poll_player_events_at(t0 + Duration::from_secs(62))
            .await
            .unwrap();

        assert_eq!(announced, 1);
        assert_eq!(
            h.chat.group_sent(),
            vec!["[Server] Charlie joined the game".to_string()]
        );
    }

    // ------------------------------------------------------------
    // Signal -> Game
    // ------------------------------------------------------------

    #[tokio::test]
    async fn test_group_chat_forwarded_to_game() {
        let h = harness();
        let mut msg = group_msg(100, "Alice", "hello 👍");
        msg.attachments.push(Attachment::new("image/png"));
        h.chat.deliver(vec![msg]);

        assert_eq!(h.bridge.poll_chat_messages().await.unwrap(), 1);
        assert_eq!(
            h.game.sent(),
            vec![("Alice".to_string(), "hello :thumbsup: [Image]".to_string())]
        );
        assert_eq!(
            h.chat.receipts.lock().unwrap().clone(),
            vec![("uuid-alice".to_string(), 100)]
        );
    }

    #[tokio::test]
    async fn test_duplicate_timestamp_dispatched_once() {
        let h = harness();
        h.chat.deliver(vec![group_msg(100, "Alice", "hi")]);
        h.chat.deliver(vec![group_msg(100, "Alice", "hi")]);

        h.bridge.poll_chat_messages().await.unwrap();
        assert_eq!(h.bridge.poll_chat_messages().await.unwrap(), 0);
        assert_eq!(h.game.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_echo_suppressed_once() {
        let h = harness();
        h.chat.deliver(vec![group_msg(100, "Alice", "gg")]);
        h.bridge.poll_chat_messages().await.unwrap();

        h.game.push(1.0, "Alice", GameMessageKind::Player, "gg");
        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 0);
        assert!(h.chat.group_sent().is_empty());

        // Suppression is single-use.
        h.game.push(2.0, "Alice", GameMessageKind::Player, "gg");
        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 1);
        assert_eq!(h.chat.group_sent(), vec!["[Alice] gg".to_string()]);
    }

    #[tokio::test]
    async fn test_echo_uses_truncated_sender() {
        let h = harness();
        let long_name = "A".repeat(40);
        h.chat.deliver(vec![group_msg(100, &long_name, "hi")]);
        h.bridge.poll_chat_messages().await.unwrap();

        h.game.push(1.0, &"A".repeat(32), GameMessageKind::Player, "hi");
        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_retracts_fingerprint() {
        let h = harness();
        *h.game.fail_sends.lock().unwrap() = true;
        h.chat.deliver(vec![group_msg(100, "Alice", "lost")]);
        assert_eq!(h.bridge.poll_chat_messages().await.unwrap(), 0);

        h.game.push(1.0, "Alice", GameMessageKind::Player, "lost");
        assert_eq!(h.bridge.poll_game_chat().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_group_message_skipped() {
        let h = harness();
        h.chat.deliver(vec![group_msg(100, "Alice", "")]);

        h.bridge.poll_chat_messages().await.unwrap();
        assert!(h.game.sent().is_empty());
    }

    #[tokio::test]
    async fn test_group_command_replies_to_group() {
        let h = harness();
        h.chat.deliver(vec![group_msg(100, "Alice", "/list")]);

        h.bridge.poll_chat_messages().await.unwrap();
        assert_eq!(h.commands.calls.lock().unwrap().clone(), vec!["list".to_string()]);
        assert_eq!(h.chat.group_sent(), vec!["reply to 'list'".to_string()]);
        assert!(h.game.sent().is_empty());
    }

    #[tokio::test]
    async fn test_direct_message_is_always_a_command() {
        let h = harness();
        h.chat.deliver(vec![direct_msg(100, "Bob", "status")]);

        h.bridge.poll_chat_messages().await.unwrap();
        assert_eq!(
            h.chat.dm_sent(),
            vec![("uuid-bob".to_string(), "reply to 'status'".to_string())]
        );
        assert!(h.game.sent().is_empty());
    }

    #[tokio::test]
    async fn test_direct_message_without_uuid_replies_to_sender() {
        let h = harness();
        let mut msg = direct_msg(100, "+15550001111", "help");
        msg.sender_id = None;
        h.chat.deliver(vec![msg]);

        h.bridge.poll_chat_messages().await.unwrap();
        assert_eq!(h.chat.dm_sent()[0].0, "+15550001111");
    }

    #[tokio::test]
    async fn test_other_group_ignored() {
        let h = harness();
        let mut msg = group_msg(100, "Alice", "hi");
        msg.group_id = Some("someone-elses-group".to_string());
        h.chat.deliver(vec![msg]);

        h.bridge.poll_chat_messages().await.unwrap();
        assert!(h.game.sent().is_empty());
        assert!(h.chat.group_sent().is_empty());
    }

    // ------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = h.bridge.run(shutdown_rx);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown_tx.send(true).unwrap();
        };

        let (_, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, stop) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dm_only_mode_skips_game_loops() {
        let game = Arc::new(FakeGame::default());
        let chat = Arc::new(FakeChat::default());
        let commands = Arc::new(EchoCommands::default());
        let settings = BridgeSettings::from_config(&Config::default());
        assert!(!settings.group_enabled);

        let bridge = Bridge::new(game.clone(), chat.clone(), commands, settings);
        chat.deliver(vec![direct_msg(100, "Bob", "list")]);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            shutdown_tx.send(true).unwrap();
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(bridge.run(shutdown_rx), stop)
        })
        .await
        .unwrap();

        assert_eq!(*game.polls.lock().unwrap(), 0);
        assert_eq!(
            chat.dm_sent(),
            vec![("uuid-bob".to_string(), "reply to 'list'".to_string())]
        );
    }

    #[test]
    fn test_retry_delay_is_fixed() {
        let delays: Vec<Duration> = loop_backoff().take(10).collect();
        assert_eq!(delays.len(), 10);
        assert!(delays.iter().all(|d| *d == RETRY_DELAY));
    }

    #[tokio::test]
    async fn test_polling_loop_retries_after_failure() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let calls = StdMutex::new(0usize);

        let polling = run_polling_loop("Test", Duration::from_millis(1), shutdown_rx, || {
            let attempt = {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            let shutdown_tx = &shutdown_tx;
            async move {
                if attempt == 1 {
                    return Err(ApiError::NotConfigured {
                        what: "test".to_string(),
                    });
                }
                shutdown_tx.send(true).unwrap();
                Ok(0)
            }
        });

        tokio::time::timeout(Duration::from_secs(10), polling)
            .await
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), 2);
    }
}
