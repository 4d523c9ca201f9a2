use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub mod completion;
pub mod error;
pub mod parser;

pub use completion::{CompletionClient, OpenAiCompletionClient};
pub use error::BotError;
pub use parser::{ParsedBotResult, parse_response};

use crate::game_logic::deck::ClueWords;
use crate::game_logic::messages::{GIVE_CLUE, GUESS_EVENT};
use crate::game_logic::{Clue, Role, Team};

/// Display name used for everything the bot says or does.
pub const BOT_NAME: &str = "ChatBot";

const CLUE_PROMPT: &str = "You are playing a word game. Your objective is to give a one-word \
clue that will help your team guess as many words as possible from your team's word list, \
while NOT guessing words from the opposing team's word list. The clue must not exactly match \
any of the words on the lists, nor may it be a direct derivative of any of them (for example, \
a plural). A good clue is a synonym or related word that evokes as many of your team's words \
as possible without also evoking the opposing team's words. When prompted, state ONLY the \
following: your clue, the number of words from your team's list that match your clue, and \
the specific words that match your clue.";

const GUESS_PROMPT: &str = "You are playing a word game. Your teammate will give you a clue \
and a number. Choose that number of words from your word list that best match the clue. \
Reply with the chosen words in capital letters, separated by commas, best match first.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamFlags {
    #[serde(default)]
    pub red: bool,
    #[serde(default)]
    pub blue: bool,
}

impl TeamFlags {
    pub fn get(&self, team: Team) -> bool {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }
}

/// Which seats a room asked the bot to fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotActions {
    #[serde(default)]
    pub cluegiver: TeamFlags,
    #[serde(default)]
    pub guesser: TeamFlags,
}

impl BotActions {
    pub fn fills(&self, team: Team, role: Role) -> bool {
        match role {
            Role::Cluegiver => self.cluegiver.get(team),
            Role::Guesser => self.guesser.get(team),
        }
    }

    pub fn fills_role(&self, role: Role) -> bool {
        Team::ALL.iter().any(|team| self.fills(*team, role))
    }

    pub fn seats(&self) -> Vec<(Team, Role)> {
        Team::ALL
            .iter()
            .flat_map(|team| Role::ALL.iter().map(move |role| (*team, *role)))
            .filter(|(team, role)| self.fills(*team, *role))
            .collect()
    }

    pub fn any(&self) -> bool {
        !self.seats().is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum BotRequest {
    Clue { team: Team, words: ClueWords },
    Guess { team: Team, clue: Clue, board: Vec<String> },
}

impl BotRequest {
    pub fn team(&self) -> Team {
        match self {
            BotRequest::Clue { team, .. } | BotRequest::Guess { team, .. } => *team,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            BotRequest::Clue { .. } => Role::Cluegiver,
            BotRequest::Guess { .. } => Role::Guesser,
        }
    }

    fn prompt(&self) -> (&'static str, String) {
        match self {
            BotRequest::Clue { words, .. } => (
                CLUE_PROMPT,
                format!(
                    "Your team's list: {}. Opposing team's list: {}.",
                    words.mine.join(", "),
                    words.others.join(", ")
                ),
            ),
            BotRequest::Guess { clue, board, .. } => {
                let number = match clue.count {
                    Some(n) => n.to_string(),
                    None => "as many as you are confident about".to_string(),
                };
                (
                    GUESS_PROMPT,
                    format!(
                        "The word list is: {}. The clue is: {}. The number is: {}",
                        board.join(", "),
                        clue.word,
                        number
                    ),
                )
            }
        }
    }
}

/// A finished bot turn, ready to be turned back into a game event.
#[derive(Debug)]
pub struct BotPlay {
    pub event_type: &'static str,
    pub result: ParsedBotResult,
    pub team: Team,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub timeout: Duration,
    pub log_responses: bool,
}

struct BotJob {
    system: &'static str,
    user: String,
    respond_to: oneshot::Sender<Result<ParsedBotResult, BotError>>,
}

#[derive(Debug, Clone)]
pub struct Bot {
    seats: BotActions,
    clue_tx: Option<mpsc::Sender<BotJob>>,
    guess_tx: Option<mpsc::Sender<BotJob>>,
}

impl Bot {
    /// Starts one worker per role the bot plays. Workers stop once every `Bot` clone is dropped.
    pub fn spawn(
        seats: BotActions,
        completion: Arc<dyn CompletionClient>,
        settings: BotSettings,
    ) -> Self {
        let clue_tx = seats.fills_role(Role::Cluegiver).then(|| {
            spawn_worker(Role::Cluegiver, Arc::clone(&completion), settings.clone())
        });
        let guess_tx = seats
            .fills_role(Role::Guesser)
            .then(|| spawn_worker(Role::Guesser, Arc::clone(&completion), settings.clone()));
        Self {
            seats,
            clue_tx,
            guess_tx,
        }
    }

    pub fn fills(&self, team: Team, role: Role) -> bool {
        self.seats.fills(team, role)
    }

    pub async fn play(&self, request: BotRequest) -> Result<BotPlay, BotError> {
        let team = request.team();
        let role = request.role();
        let worker = match role {
            Role::Cluegiver => self.clue_tx.as_ref(),
            Role::Guesser => self.guess_tx.as_ref(),
        }
        .filter(|_| self.seats.fills(team, role))
        .ok_or(BotError::SeatNotFilled { team, role })?;

        let (system, user) = request.prompt();
        let (respond_to, response) = oneshot::channel();
        worker
            .send(BotJob {
                system,
                user,
                respond_to,
            })
            .await
            .map_err(|_| BotError::WorkerGone)?;
        let result = response.await.map_err(|_| BotError::WorkerGone)??;

        let event_type = match role {
            Role::Cluegiver => GIVE_CLUE,
            Role::Guesser => GUESS_EVENT,
        };
        Ok(BotPlay {
            event_type,
            result,
            team,
            role,
        })
    }
}

fn spawn_worker(
    role: Role,
    completion: Arc<dyn CompletionClient>,
    settings: BotSettings,
) -> mpsc::Sender<BotJob> {
    let (sender, receiver) = mpsc::channel(1);
    tokio::spawn(run_bot_worker(role, receiver, completion, settings));
    sender
}

#[tracing::instrument(skip(receiver, completion, settings), fields(bot.role = %role))]
async fn run_bot_worker(
    role: Role,
    mut receiver: mpsc::Receiver<BotJob>,
    completion: Arc<dyn CompletionClient>,
    settings: BotSettings,
) {
    tracing::debug!("Bot worker started");
    while let Some(job) = receiver.recv().await {
        let reply = tokio::time::timeout(
            settings.timeout,
            completion.complete(job.system, &job.user),
        )
        .await;

        let outcome = match reply {
            Ok(Ok(text)) => {
                if settings.log_responses {
                    tracing::info!(bot.response = %text, "Completion reply");
                } else {
                    tracing::debug!(bot.response = %text, "Completion reply");
                }
                let parsed = parse_response(&text);
                if parsed.is_partial() {
                    tracing::warn!(issues = ?parsed.issues, "Bot reply only partially understood");
                }
                Ok(parsed)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Completion request failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(timeout = ?settings.timeout, "Completion request timed out");
                Err(BotError::Timeout(settings.timeout))
            }
        };

        if job.respond_to.send(outcome).is_err() {
            tracing::debug!("Bot requester went away before the reply arrived");
        }
    }
    tracing::debug!("Bot worker stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed text and records every prompt it was given.
    pub(crate) struct ScriptedCompletion {
        pub reply: Mutex<String>,
        pub delay: Duration,
        pub prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedCompletion {
        pub(crate) fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(reply.to_string()),
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn set_reply(&self, reply: &str) {
            *self.reply.lock().unwrap() = reply.to_string();
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, system: &str, user: &str) -> Result<String, BotError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.reply.lock().unwrap().clone())
        }
    }

    pub(crate) fn settings() -> BotSettings {
        BotSettings {
            timeout: Duration::from_secs(5),
            log_responses: false,
        }
    }

    fn red_cluegiver() -> BotActions {
        BotActions {
            cluegiver: TeamFlags {
                red: true,
                blue: false,
            },
            guesser: TeamFlags::default(),
        }
    }

    #[test]
    fn test_bot_actions_from_wire() {
        let actions: BotActions =
            serde_json::from_str(r#"{"cluegiver":{"red":true},"guesser":{"blue":true}}"#).unwrap();
        assert!(actions.fills(Team::Red, Role::Cluegiver));
        assert!(actions.fills(Team::Blue, Role::Guesser));
        assert!(!actions.fills(Team::Blue, Role::Cluegiver));
        assert_eq!(
            actions.seats(),
            vec![(Team::Red, Role::Cluegiver), (Team::Blue, Role::Guesser)]
        );
        assert!(!BotActions::default().any());
    }

    #[tokio::test]
    async fn test_play_clue_round_trip() {
        let completion = ScriptedCompletion::new("Clue: Measure\nWords: SCALE, WATCH, MAPLE");
        let bot = Bot::spawn(red_cluegiver(), completion.clone(), settings());

        let play = bot
            .play(BotRequest::Clue {
                team: Team::Red,
                words: ClueWords {
                    mine: vec!["SCALE".to_string(), "WATCH".to_string()],
                    others: vec!["APPLE".to_string()],
                },
            })
            .await
            .unwrap();

        assert_eq!(play.event_type, GIVE_CLUE);
        assert_eq!(play.team, Team::Red);
        assert_eq!(play.role, Role::Cluegiver);
        assert_eq!(play.result.clue, "Measure");
        assert_eq!(play.result.count, Some(3));

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            prompts[0].1,
            "Your team's list: SCALE, WATCH. Opposing team's list: APPLE."
        );
    }

    #[tokio::test]
    async fn test_guess_prompt_carries_clue() {
        let completion = ScriptedCompletion::new("SCALE, WATCH");
        let seats = BotActions {
            cluegiver: TeamFlags::default(),
            guesser: TeamFlags {
                red: false,
                blue: true,
            },
        };
        let bot = Bot::spawn(seats, completion.clone(), settings());

        let play = bot
            .play(BotRequest::Guess {
                team: Team::Blue,
                clue: Clue {
                    word: "Measure".to_string(),
                    count: Some(2),
                },
                board: vec!["SCALE".to_string(), "WATCH".to_string(), "APPLE".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(play.event_type, GUESS_EVENT);
        assert_eq!(play.result.candidates, vec!["SCALE", "WATCH"]);
        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(
            prompts[0].1,
            "The word list is: SCALE, WATCH, APPLE. The clue is: Measure. The number is: 2"
        );
    }

    #[tokio::test]
    async fn test_unfilled_seat_is_rejected() {
        let bot = Bot::spawn(red_cluegiver(), ScriptedCompletion::new("x"), settings());
        let result = bot
            .play(BotRequest::Clue {
                team: Team::Blue,
                words: ClueWords::default(),
            })
            .await;
        assert!(matches!(
            result,
            Err(BotError::SeatNotFilled {
                team: Team::Blue,
                role: Role::Cluegiver
            })
        ));
    }

    #[tokio::test]
    async fn test_completion_timeout() {
        let completion = Arc::new(ScriptedCompletion {
            reply: Mutex::new("Clue: Late 1".to_string()),
            delay: Duration::from_millis(500),
            prompts: Mutex::new(Vec::new()),
        });
        let bot = Bot::spawn(
            red_cluegiver(),
            completion,
            BotSettings {
                timeout: Duration::from_millis(20),
                log_responses: false,
            },
        );
        let result = bot
            .play(BotRequest::Clue {
                team: Team::Red,
                words: ClueWords::default(),
            })
            .await;
        assert!(matches!(result, Err(BotError::Timeout(_))));
    }
}
