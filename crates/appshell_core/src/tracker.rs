//! Namespace-scoped tracking of live widget instances.
//!
//! # Responsibility
//! - Keep the set of open widgets for one namespace and the current widget.
//! - Drop widgets automatically when they are disposed.
//! - Persist restoration entries once a restorer has attached options.
//!
//! # Invariants
//! - A widget is tracked at most once; removal on disposal happens once.
//! - Listeners run after state is updated and never under the tracker lock.
//! - Persisted keys are `namespace:name(widget)`.

use crate::restorer::RestoreOptions;
use crate::shared::lock;
use crate::statedb::{state_key, StateDb, StateDbError};
use crate::widget::Widget;
use log::{debug, warn};
use serde_json::json;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Mutex, Weak};

pub type TrackerResult<T> = Result<T, TrackerError>;

type CurrentChangedListener = Arc<dyn Fn(Option<&Widget>) + Send + Sync>;
type WidgetAddedListener = Arc<dyn Fn(&Widget) + Send + Sync>;

#[derive(Clone)]
struct Persistence {
    options: RestoreOptions,
    state_db: Arc<StateDb>,
}

impl Persistence {
    fn key(&self, namespace: &str, widget: &Widget) -> String {
        state_key(namespace, &(self.options.name)(widget))
    }
}

#[derive(Default)]
struct TrackerState {
    widgets: Vec<Widget>,
    current: Option<Widget>,
    persistence: Option<Persistence>,
    current_changed: Vec<CurrentChangedListener>,
    widget_added: Vec<WidgetAddedListener>,
}

/// Shared tracker handle; clones observe the same set.
#[derive(Clone)]
pub struct InstanceTracker {
    namespace: Arc<str>,
    state: Arc<Mutex<TrackerState>>,
}

impl InstanceTracker {
    /// Creates an empty tracker.
    ///
    /// # Errors
    /// - `InvalidNamespace` when `namespace` is blank or contains `:`.
    pub fn new(namespace: impl Into<String>) -> TrackerResult<Self> {
        let namespace: String = namespace.into();
        if namespace.trim().is_empty() || namespace.contains(':') {
            return Err(TrackerError::InvalidNamespace(namespace));
        }
        Ok(Self {
            namespace: Arc::from(namespace),
            state: Arc::new(Mutex::new(TrackerState::default())),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Starts tracking `widget`.
    ///
    /// The first widget tracked while nothing is current becomes current.
    ///
    /// # Errors
    /// - `DuplicateWidget` when the widget is already tracked here.
    /// - `WidgetDisposed` when the widget was disposed before tracking.
    pub fn add(&self, widget: &Widget) -> TrackerResult<()> {
        if widget.is_disposed() {
            return Err(TrackerError::WidgetDisposed(widget.id().to_string()));
        }

        let (added, current_changed, persistence) = {
            let mut state = lock(&self.state);
            if state.widgets.iter().any(|tracked| tracked.same(widget)) {
                return Err(TrackerError::DuplicateWidget {
                    namespace: self.namespace.to_string(),
                    widget_id: widget.id().to_string(),
                });
            }
            state.widgets.push(widget.clone());
            let became_current = state.current.is_none();
            if became_current {
                state.current = Some(widget.clone());
            }
            (
                state.widget_added.clone(),
                became_current.then(|| state.current_changed.clone()),
                state.persistence.clone(),
            )
        };

        let weak = Arc::downgrade(&self.state);
        let namespace = Arc::clone(&self.namespace);
        let subscribed = widget.on_disposed(move |disposed| {
            forget_disposed(&namespace, &weak, disposed);
        });
        if !subscribed {
            forget_disposed(&self.namespace, &Arc::downgrade(&self.state), widget);
            return Ok(());
        }

        debug!(
            "event=tracker_add module=tracker status=ok namespace={} widget={}",
            self.namespace,
            widget.id()
        );
        if let Some(persistence) = persistence {
            persist(&self.namespace, &persistence, widget);
        }
        for listener in added {
            listener(widget);
        }
        if let Some(listeners) = current_changed {
            for listener in listeners {
                listener(Some(widget));
            }
        }
        Ok(())
    }

    /// Marks a tracked widget as current.
    pub fn activate(&self, widget: &Widget) -> TrackerResult<()> {
        let listeners = {
            let mut state = lock(&self.state);
            if !state.widgets.iter().any(|tracked| tracked.same(widget)) {
                return Err(self.not_tracked(widget));
            }
            if state
                .current
                .as_ref()
                .is_some_and(|current| current.same(widget))
            {
                return Ok(());
            }
            state.current = Some(widget.clone());
            state.current_changed.clone()
        };
        for listener in listeners {
            listener(Some(widget));
        }
        Ok(())
    }

    /// Re-persists the restoration entry of a tracked widget.
    ///
    /// Returns `false` when no restorer has attached options yet.
    pub fn save(&self, widget: &Widget) -> TrackerResult<bool> {
        let persistence = {
            let state = lock(&self.state);
            if !state.widgets.iter().any(|tracked| tracked.same(widget)) {
                return Err(self.not_tracked(widget));
            }
            state.persistence.clone()
        };
        let Some(persistence) = persistence else {
            return Ok(false);
        };
        let key = persistence.key(&self.namespace, widget);
        persistence
            .state_db
            .save(&key, &json!({ "data": (persistence.options.args)(widget) }))?;
        Ok(true)
    }

    pub fn current_widget(&self) -> Option<Widget> {
        lock(&self.state).current.clone()
    }

    pub fn has(&self, widget: &Widget) -> bool {
        lock(&self.state)
            .widgets
            .iter()
            .any(|tracked| tracked.same(widget))
    }

    pub fn size(&self) -> usize {
        lock(&self.state).widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Tracked widgets in insertion order.
    pub fn widgets(&self) -> Vec<Widget> {
        lock(&self.state).widgets.clone()
    }

    pub fn find(&self, predicate: impl Fn(&Widget) -> bool) -> Option<Widget> {
        self.widgets().into_iter().find(|widget| predicate(widget))
    }

    pub fn filter(&self, predicate: impl Fn(&Widget) -> bool) -> Vec<Widget> {
        self.widgets()
            .into_iter()
            .filter(|widget| predicate(widget))
            .collect()
    }

    pub fn on_current_changed(&self, listener: impl Fn(Option<&Widget>) + Send + Sync + 'static) {
        lock(&self.state).current_changed.push(Arc::new(listener));
    }

    pub fn on_widget_added(&self, listener: impl Fn(&Widget) + Send + Sync + 'static) {
        lock(&self.state).widget_added.push(Arc::new(listener));
    }

    /// Attaches restoration options; returns `false` if already attached.
    pub(crate) fn attach_persistence(
        &self,
        options: RestoreOptions,
        state_db: Arc<StateDb>,
    ) -> bool {
        let mut state = lock(&self.state);
        if state.persistence.is_some() {
            return false;
        }
        state.persistence = Some(Persistence { options, state_db });
        true
    }

    fn not_tracked(&self, widget: &Widget) -> TrackerError {
        TrackerError::NotTracked {
            namespace: self.namespace.to_string(),
            widget_id: widget.id().to_string(),
        }
    }
}

impl Debug for InstanceTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceTracker")
            .field("namespace", &self.namespace)
            .field("size", &self.size())
            .finish()
    }
}

fn persist(namespace: &str, persistence: &Persistence, widget: &Widget) {
    let key = persistence.key(namespace, widget);
    let value = json!({ "data": (persistence.options.args)(widget) });
    if let Err(err) = persistence.state_db.save(&key, &value) {
        warn!("event=tracker_persist module=tracker status=error key={key} error={err}");
    }
}

fn forget_disposed(namespace: &str, state: &Weak<Mutex<TrackerState>>, widget: &Widget) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let (current_changed, new_current, persistence) = {
        let mut state = lock(&state);
        let Some(position) = state
            .widgets
            .iter()
            .position(|tracked| tracked.same(widget))
        else {
            return;
        };
        state.widgets.remove(position);
        let was_current = state
            .current
            .as_ref()
            .is_some_and(|current| current.same(widget));
        if was_current {
            state.current = state.widgets.last().cloned();
        }
        (
            was_current.then(|| state.current_changed.clone()),
            state.current.clone(),
            state.persistence.clone(),
        )
    };

    debug!(
        "event=tracker_remove module=tracker status=ok namespace={namespace} widget={}",
        widget.id()
    );
    if let Some(persistence) = persistence {
        let key = persistence.key(namespace, widget);
        if let Err(err) = persistence.state_db.remove(&key) {
            warn!("event=tracker_forget module=tracker status=error key={key} error={err}");
        }
    }
    if let Some(listeners) = current_changed {
        for listener in listeners {
            listener(new_current.as_ref());
        }
    }
}

/// Instance tracker errors.
#[derive(Debug)]
pub enum TrackerError {
    InvalidNamespace(String),
    DuplicateWidget {
        namespace: String,
        widget_id: String,
    },
    WidgetDisposed(String),
    NotTracked {
        namespace: String,
        widget_id: String,
    },
    State(StateDbError),
}

impl Display for TrackerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNamespace(value) => write!(f, "tracker namespace is invalid: `{value}`"),
            Self::DuplicateWidget {
                namespace,
                widget_id,
            } => write!(f, "widget `{widget_id}` is already tracked in `{namespace}`"),
            Self::WidgetDisposed(widget_id) => {
                write!(f, "widget `{widget_id}` is disposed and cannot be tracked")
            }
            Self::NotTracked {
                namespace,
                widget_id,
            } => write!(f, "widget `{widget_id}` is not tracked in `{namespace}`"),
            Self::State(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TrackerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::State(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StateDbError> for TrackerError {
    fn from(value: StateDbError) -> Self {
        Self::State(value)
    }
}
