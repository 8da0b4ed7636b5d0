// Scripted replay of gestures against the engine
// Used for reproducing interaction bugs without a UI

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use calendar_engine::error::EngineError;
use calendar_engine::models::event::CalendarEvent;
use calendar_engine::models::recurrence::RecurrenceSpec;
use calendar_engine::models::settings::EngineSettings;
use calendar_engine::services::cache::OptimisticEventCache;
use calendar_engine::services::deletion::{DeletionPlan, RecurringDeletionResolver};
use calendar_engine::services::drag::{DragInteractionController, GestureOutcome, PointerInput, PointerTarget};
use calendar_engine::services::editor::EventDraft;
use calendar_engine::services::store::{DeletionMode, EventStore};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    pub range_start: DateTime<Local>,
    pub range_end: DateTime<Local>,
    #[serde(default = "default_container_width")]
    pub container_width: f64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_container_width() -> f64 {
    700.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Step {
    #[serde(rename_all = "camelCase")]
    Create {
        /// Name later steps use to refer to the created event.
        alias: Option<String>,
        summary: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
        #[serde(default)]
        color_id: Option<String>,
        #[serde(default)]
        rrule: Option<String>,
    },
    Pointer {
        input: PointerInput,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        /// Alias or id of the event (or series master).
        event: String,
        /// Pick one occurrence of a series by its original start.
        #[serde(default)]
        occurrence: Option<DateTime<Local>>,
        #[serde(default = "default_mode")]
        mode: DeletionMode,
    },
}

fn default_mode() -> DeletionMode {
    DeletionMode::Instance
}

impl ReplayScript {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse script {}", path.display()))
    }
}

/// Outcome of one step, printed in the final report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub result: String,
}

pub struct Replay<'a> {
    store: &'a dyn EventStore,
    controller: DragInteractionController,
    cache: OptimisticEventCache,
    aliases: HashMap<String, String>,
}

impl<'a> Replay<'a> {
    pub fn new(store: &'a dyn EventStore, settings: &EngineSettings, container_width: f64) -> Self {
        let mut controller = DragInteractionController::from_settings(settings);
        controller.geometry_mut().set_container_width(container_width);
        Self {
            store,
            controller,
            cache: OptimisticEventCache::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn cache(&self) -> &OptimisticEventCache {
        &self.cache
    }

    /// Run every step in order. Engine errors are recorded in the report and
    /// do not stop the replay.
    pub async fn run(&mut self, script: &ReplayScript) -> Result<Vec<StepReport>> {
        self.cache
            .load_range(self.store, script.range_start, script.range_end)
            .await?;

        let mut reports = Vec::with_capacity(script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            let result = match self.step(step).await {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("Step {} failed: {}", index, err);
                    format!("error: {}", err)
                }
            };
            reports.push(StepReport { index, result });
        }
        Ok(reports)
    }

    async fn step(&mut self, step: &Step) -> Result<String, EngineError> {
        match step {
            Step::Create {
                alias,
                summary,
                start,
                end,
                color_id,
                rrule,
            } => {
                let mut draft = EventDraft::for_slot(*start, *end);
                draft.summary = summary.clone();
                draft.color_id = color_id.clone();
                if let Some(rule) = rrule {
                    draft.recurrence = RecurrenceSpec::from_recurrence(&[rule.clone()], *start);
                }
                let saved = draft.save(None, &mut self.cache, self.store).await?;
                if let Some(alias) = alias {
                    self.aliases.insert(alias.clone(), saved.id.clone());
                }
                Ok(format!("created {}", saved.id))
            }
            Step::Pointer { input } => {
                let input = self.resolve_input(input);
                let outcome = self
                    .controller
                    .dispatch(&input, &mut self.cache, self.store)
                    .await?;
                self.follow_up(outcome).await
            }
            Step::Delete {
                event,
                occurrence,
                mode,
            } => {
                let target = self.find_target(event, *occurrence)?;
                let plan = RecurringDeletionResolver::plan(&target);
                RecurringDeletionResolver::execute(&plan, *mode, &mut self.cache, self.store).await?;
                Ok(match plan {
                    DeletionPlan::Direct { event_id } => format!("deleted {}", event_id),
                    DeletionPlan::Scoped(_) => format!("deleted {} ({})", target.id, mode.label()),
                })
            }
        }
    }

    async fn follow_up(&mut self, outcome: GestureOutcome) -> Result<String, EngineError> {
        Ok(match outcome {
            GestureOutcome::QuickCreate { start, end } => {
                let saved = EventDraft::for_slot(start, end)
                    .save(None, &mut self.cache, self.store)
                    .await?;
                format!("quick-created {} at {}", saved.id, saved.start)
            }
            GestureOutcome::Committed(event) => {
                format!("moved {} to {} - {}", event.id, event.start, event.end)
            }
            other => format!("{:?}", other),
        })
    }

    fn resolve(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Pointer targets may name events by alias. A series alias with no
    /// cached event of its own resolves to its first cached occurrence.
    fn resolve_input(&self, input: &PointerInput) -> PointerInput {
        let mut input = input.clone();
        if let Some(PointerTarget::Event { event_id, .. }) = input.target.as_mut() {
            let id = self.resolve(event_id);
            *event_id = match self.cache.get(&id) {
                Some(_) => id,
                None => self
                    .cache
                    .events()
                    .into_iter()
                    .find(|event| event.recurring_event_id.as_deref() == Some(id.as_str()))
                    .map(|event| event.id.clone())
                    .unwrap_or(id),
            };
        }
        input
    }

    fn find_target(&self, name: &str, occurrence: Option<DateTime<Local>>) -> Result<CalendarEvent, EngineError> {
        let id = self.resolve(name);
        let found = match occurrence {
            Some(original) => self.cache.events().into_iter().find(|event| {
                event.recurring_event_id.as_deref() == Some(id.as_str())
                    && event.original_start_time == Some(original)
            }),
            None => self.cache.get(&id),
        };
        found.cloned().ok_or(EngineError::NotFound(id))
    }
}

/// Events of the visible range as pretty JSON.
pub fn render_events(cache: &OptimisticEventCache) -> Result<String> {
    let events: Vec<&CalendarEvent> = cache.events();
    serde_json::to_string_pretty(&events).map_err(|e| anyhow!("Failed to render events: {}", e))
}
