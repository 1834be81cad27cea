//! Interactive command session.
//!
//! Each line is either an utterance or a reply to the action awaiting
//! confirmation. Executing an action is outside this program, so a confirmed
//! action is reported as done straight away.

use chrono::Utc;
use cortex_chain::{ChainDriver, ChainError, ChainEvent};
use cortex_core::types::{
    ChainMetadata, ChainSource, IntentChain, NudgeSuggestion, SessionContext,
};
use cortex_nudge::{suggested_action, CompletedAction, NudgeEngine, SuggestionQueue};
use cortex_orchestrator::{confirmation_message, CortexPipeline};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

/// Keep at most this many utterances as context.
const HISTORY: usize = 10;

/// What the session wants printed, and whether to keep going.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn say(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

pub struct Session {
    pipeline: CortexPipeline,
    driver: ChainDriver,
    nudges: NudgeEngine,
    queue: SuggestionQueue,
    context: SessionContext,
}

impl Session {
    pub fn new(
        pipeline: CortexPipeline,
        driver: ChainDriver,
        nudges: NudgeEngine,
        context: SessionContext,
    ) -> Self {
        Self {
            pipeline,
            driver,
            nudges,
            queue: SuggestionQueue::new(),
            context,
        }
    }

    pub fn suggestions(&self) -> &[NudgeSuggestion] {
        self.queue.active()
    }

    pub fn driver(&self) -> &ChainDriver {
        &self.driver
    }

    /// Handle one input line.
    pub async fn handle(&mut self, line: &str) -> Reply {
        let mut reply = Reply::default();
        let line = line.trim();
        self.queue.purge_expired(Utc::now());

        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let result = match word.to_lowercase().as_str() {
            "" => Ok(()),
            ":q" | ":quit" | ":stop" => {
                reply.quit = true;
                Ok(())
            }
            ":ja" | ":j" => self.confirm_current(&mut reply).await,
            ":nee" | ":n" => self.skip_current(&mut reply).await,
            ":annuleer" => self.dismiss_chain(&mut reply),
            ":accepteer" => self.accept_suggestion(rest, &mut reply),
            ":negeer" => self.dismiss_suggestion(rest, &mut reply),
            _ => {
                self.utterance(line, &mut reply).await;
                Ok(())
            }
        };
        if let Err(err) = result {
            reply.say(format!("! {}", err));
        }
        reply
    }

    async fn utterance(&mut self, text: &str, reply: &mut Reply) {
        let outcome = self.pipeline.process(text, &self.context).await;

        self.context.recent_utterances.push(text.to_string());
        if self.context.recent_utterances.len() > HISTORY {
            self.context.recent_utterances.remove(0);
        }
        if let Some(patient) = outcome
            .chain
            .actions
            .iter()
            .find_map(|a| a.entities.patient_reference())
        {
            self.context.active_patient = Some(patient.to_string());
        }

        let source = match outcome.chain.metadata.source {
            ChainSource::Local => "lokaal",
            ChainSource::Ai => "AI",
        };
        reply.say(format!(
            "[{}] {} actie(s), {:.1} ms",
            source,
            outcome.chain.actions.len(),
            outcome.chain.metadata.processing_time_ms
        ));
        if self.driver.load(outcome.chain).is_some() {
            reply.say("Vorige opdracht vervangen.");
        }
        self.prompt_current(reply);
    }

    async fn confirm_current(&mut self, reply: &mut Reply) -> Result<(), ChainError> {
        let (id, raw_input) = self.current()?;
        self.driver.start(id)?;
        let done = self.driver.succeed(id)?;
        reply.say(format!("Uitgevoerd: {}", done.intent));

        let completed = CompletedAction::from_action(&done, &raw_input);
        let suggestions = self.nudges.evaluate(&completed, Utc::now());
        self.queue.extend(suggestions);
        self.list_suggestions(reply);

        self.advance(reply).await;
        Ok(())
    }

    async fn skip_current(&mut self, reply: &mut Reply) -> Result<(), ChainError> {
        let (id, _) = self.current()?;
        self.driver.skip(id)?;
        reply.say("Overgeslagen.");
        self.advance(reply).await;
        Ok(())
    }

    fn dismiss_chain(&mut self, reply: &mut Reply) -> Result<(), ChainError> {
        let chain = self.driver.dismiss()?;
        reply.say(format!("Opdracht geannuleerd ({}).", chain.status));
        Ok(())
    }

    fn accept_suggestion(&mut self, arg: &str, reply: &mut Reply) -> Result<(), ChainError> {
        let Some(id) = self.suggestion_id(arg) else {
            reply.say("Geen suggestie met dat nummer.");
            return Ok(());
        };
        let Some(suggestion) = self.queue.accept(id) else {
            return Ok(());
        };
        let mut action = suggested_action(&suggestion);
        action.confirmation_message =
            Some(confirmation_message(action.intent, &action.entities));
        let chain = IntentChain::new(
            suggestion.suggestion.message.clone(),
            vec![action],
            ChainMetadata {
                source: ChainSource::Local,
                ai_reasoning: None,
                processing_time_ms: 0.0,
                created_at: Utc::now(),
            },
        );
        self.driver.load(chain);
        self.prompt_current(reply);
        Ok(())
    }

    fn dismiss_suggestion(&mut self, arg: &str, reply: &mut Reply) -> Result<(), ChainError> {
        match self.suggestion_id(arg).and_then(|id| self.queue.dismiss(id)) {
            Some(_) => reply.say("Suggestie genegeerd."),
            None => reply.say("Geen suggestie met dat nummer."),
        }
        Ok(())
    }

    /// Run automatic steps until the chain waits for the user or closes.
    async fn advance(&mut self, reply: &mut Reply) {
        while let Some(event) = self.driver.settle().await {
            match event {
                ChainEvent::Promoted(_) => {
                    self.prompt_current(reply);
                    break;
                }
                ChainEvent::Closed(chain) => {
                    reply.say(format!("Opdracht afgerond: {}.", chain.status));
                    break;
                }
            }
        }
    }

    fn current(&self) -> Result<(Uuid, String), ChainError> {
        let chain = self.driver.chain().ok_or(ChainError::NoActiveChain)?;
        let action = chain.current().ok_or(ChainError::NoActiveChain)?;
        Ok((action.id, chain.raw_input.clone()))
    }

    fn prompt_current(&self, reply: &mut Reply) {
        if let Some(action) = self.driver.chain().and_then(|c| c.current()) {
            let message = action
                .confirmation_message
                .clone()
                .unwrap_or_else(|| confirmation_message(action.intent, &action.entities));
            reply.say(format!("? {} (:ja / :nee)", message));
        }
    }

    fn list_suggestions(&self, reply: &mut Reply) {
        for (i, s) in self.queue.active().iter().enumerate() {
            reply.say(format!(
                "  {}. [{}] {} (:accepteer {})",
                i + 1,
                s.priority,
                s.suggestion.message,
                i + 1
            ));
        }
    }

    /// 1-based index into the live suggestions.
    fn suggestion_id(&self, arg: &str) -> Option<Uuid> {
        let n: usize = arg.trim().parse().ok()?;
        self.queue.active().get(n.checked_sub(1)?).map(|s| s.id)
    }
}

/// Read lines from stdin until end of input or `:stop`.
pub async fn run(mut session: Session) -> std::io::Result<()> {
    println!("Cortex. Typ een opdracht, of :stop om te stoppen.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = session.handle(&line).await;
        for l in &reply.lines {
            println!("{}", l);
        }
        if reply.quit {
            break;
        }
    }
    Ok(())
}
