#![forbid(unsafe_code)]

//! Scripted replay of the experiment page.
//!
//! The page has three components sharing one `{name, age}` store: a name
//! input, an age input, and a card showing both. Each edit is written through
//! the editing component's own view, then the render queue is flushed, so the
//! final render counts show exactly which components each write reached.
//! The unstable baseline binds every component to the whole value for
//! comparison.

use std::cell::RefCell;
use std::fmt;

use serde_json::json;
use stable_state::{
    Consumer, GlobalLoading, Provider, RenderCx, RenderQueue, Result, StateError, StoreConfig,
    Value, View, create_with_config, fields_from_json, use_global_loading, use_scoped_store,
};

use crate::cli::Scenario;

/// Components on the page, in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    AgeName,
    NameInput,
    AgeInput,
}

impl Widget {
    pub const ALL: [Widget; 3] = [Self::AgeName, Self::NameInput, Self::AgeInput];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AgeName => "age-name",
            Self::NameInput => "name-input",
            Self::AgeInput => "age-input",
        }
    }

    fn draw(self, view: &View<Value>) -> String {
        match self {
            Self::NameInput => text(view.get("name")),
            Self::AgeInput => text(view.get("age")),
            Self::AgeName => format!("{}, {}", text(view.get("name")), text(view.get("age"))),
        }
    }
}

fn text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// One user edit: `widget` writes `value` to `key`.
#[derive(Debug, Clone)]
pub struct Edit {
    pub widget: Widget,
    pub key: &'static str,
    pub value: Value,
}

/// Type "Jane", bump the age twice, then retype the same name.
#[must_use]
pub fn script() -> Vec<Edit> {
    vec![
        Edit {
            widget: Widget::NameInput,
            key: "name",
            value: json!("Jane"),
        },
        Edit {
            widget: Widget::AgeInput,
            key: "age",
            value: json!(21),
        },
        Edit {
            widget: Widget::AgeInput,
            key: "age",
            value: json!(22),
        },
        Edit {
            widget: Widget::NameInput,
            key: "name",
            value: json!("Jane"),
        },
    ]
}

fn initial_user() -> Value {
    json!({ "name": "John", "age": 20 })
}

type Accessor<'a> = dyn Fn(&mut RenderCx<'_>) -> Result<View<Value>> + 'a;

struct Mounted {
    widget: Widget,
    consumer: Consumer,
    view: RefCell<Option<View<Value>>>,
    output: RefCell<String>,
}

/// The three components, mounted and bound through `accessor`.
pub struct Page<'a> {
    queue: RenderQueue,
    mounted: Vec<Mounted>,
    accessor: Box<Accessor<'a>>,
}

impl<'a> Page<'a> {
    /// Mount every component with one initial render.
    ///
    /// Call inside a provider's `render` for the scoped variant: each
    /// component keeps the providers it was mounted under.
    pub fn mount(accessor: impl Fn(&mut RenderCx<'_>) -> Result<View<Value>> + 'a) -> Result<Self> {
        let queue = RenderQueue::new();
        let mounted = Widget::ALL
            .iter()
            .map(|&widget| Mounted {
                widget,
                consumer: Consumer::with_queue(widget.label(), &queue),
                view: RefCell::new(None),
                output: RefCell::new(String::new()),
            })
            .collect();
        let page = Self {
            queue,
            mounted,
            accessor: Box::new(accessor),
        };
        for mounted in &page.mounted {
            page.render(mounted)?;
        }
        Ok(page)
    }

    fn render(&self, mounted: &Mounted) -> Result<()> {
        let (view, output) = mounted.consumer.render(|cx| {
            let view = (self.accessor)(cx)?;
            let output = mounted.widget.draw(&view);
            Ok::<_, StateError>((view, output))
        })?;
        *mounted.view.borrow_mut() = Some(view);
        *mounted.output.borrow_mut() = output;
        Ok(())
    }

    /// Apply one edit and flush. Returns the number of re-renders it caused.
    pub fn apply(&self, edit: &Edit) -> Result<usize> {
        let target = self.mounted.iter().find(|m| m.widget == edit.widget);
        if let Some(view) = target.and_then(|m| m.view.borrow().clone()) {
            view.set(edit.key, edit.value.clone());
        }
        self.flush()
    }

    /// Re-render every component with a pending request.
    pub fn flush(&self) -> Result<usize> {
        let mut failure = None;
        let rendered = self.queue.flush(|consumer| {
            let Some(mounted) = self.mounted.iter().find(|m| m.consumer.id() == consumer.id()) else {
                return;
            };
            if let Err(err) = self.render(mounted) {
                failure.get_or_insert(err);
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(rendered),
        }
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.mounted
            .iter()
            .map(|m| Row {
                component: m.widget.label(),
                renders: m.consumer.render_count(),
                shows: m.output.borrow().clone(),
            })
            .collect()
    }

    pub fn unmount(&self) {
        for mounted in &self.mounted {
            mounted.consumer.unmount();
        }
    }
}

/// Loading indicator bound to the shared loading flag.
struct Spinner {
    queue: RenderQueue,
    consumer: Consumer,
    output: RefCell<String>,
}

impl Spinner {
    fn mount() -> Self {
        let queue = RenderQueue::new();
        let consumer = Consumer::with_queue("spinner", &queue);
        let spinner = Self {
            queue,
            consumer,
            output: RefCell::new(String::new()),
        };
        spinner.render();
        spinner
    }

    fn render(&self) {
        let loading = self.consumer.render(|cx| use_global_loading(cx).is_loading);
        *self.output.borrow_mut() = if loading { "loading" } else { "idle" }.to_string();
    }

    fn flush(&self) {
        let rendered = self.queue.flush(|_| self.render());
        tracing::trace!(rendered, "spinner flushed");
    }

    fn row(&self) -> Row {
        Row {
            component: "spinner",
            renders: self.consumer.render_count(),
            shows: self.output.borrow().clone(),
        }
    }
}

/// Stand-in for the page's server fetch, flagged on the shared loading state.
fn fetch_user(spinner: &Spinner) -> Value {
    let loading = GlobalLoading::shared();
    loading.set_loading(true);
    spinner.flush();
    let user = initial_user();
    loading.set_loading(false);
    spinner.flush();
    user
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub component: &'static str,
    pub renders: u64,
    pub shows: String,
}

/// Render counts after replaying the script once.
#[derive(Debug, Clone)]
pub struct Report {
    pub scenario: Scenario,
    pub config: StoreConfig,
    pub edits: usize,
    pub rows: Vec<Row>,
}

impl Report {
    #[must_use]
    pub fn renders_of(&self, component: &str) -> Option<u64> {
        self.rows
            .iter()
            .find(|row| row.component == component)
            .map(|row| row.renders)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (equality={}, tracking={}, edits={})",
            self.scenario, self.config.equality, self.config.tracking, self.edits
        )?;
        writeln!(f, "  {:<12} {:>7}  shows", "component", "renders")?;
        for row in &self.rows {
            writeln!(f, "  {:<12} {:>7}  {}", row.component, row.renders, row.shows)?;
        }
        Ok(())
    }
}

fn replay(page: &Page<'_>, scenario: Scenario, config: &StoreConfig) -> Result<Report> {
    let script = script();
    for edit in &script {
        let rendered = page.apply(edit)?;
        tracing::info!(
            %scenario,
            component = edit.widget.label(),
            key = edit.key,
            value = %edit.value,
            rendered,
            "edit applied"
        );
    }
    Ok(Report {
        scenario,
        config: config.clone(),
        edits: script.len(),
        rows: page.rows(),
    })
}

/// The page half bound through a `create` accessor.
pub fn run_factory(config: &StoreConfig) -> Result<Report> {
    let use_person = create_with_config(
        fields_from_json(initial_user())?,
        config.clone().with_label("factory"),
    );
    let page = Page::mount(|cx| Ok(use_person.use_store(cx)))?;
    let report = replay(&page, Scenario::Factory, config)?;
    page.unmount();
    tracing::debug!(
        listeners = use_person.store().listener_count(),
        "factory page unmounted"
    );
    Ok(report)
}

/// Baseline: every component reads the whole `{name, age}` value, as with a
/// plain shared context, so every write re-renders the whole page.
pub fn run_unstable(config: &StoreConfig) -> Result<Report> {
    let use_person = create_with_config(
        fields_from_json(initial_user())?,
        config.clone().with_label("unstable"),
    );
    let page = Page::mount(|cx| {
        let view = use_person.use_store(cx);
        for key in use_person.store().keys() {
            let _ = view.get(&key);
        }
        Ok(view)
    })?;
    let report = replay(&page, Scenario::Unstable, config)?;
    page.unmount();
    Ok(report)
}

/// The page half bound through the nearest provider, seeded from a fetch.
pub fn run_provider(config: &StoreConfig) -> Result<Report> {
    let spinner = Spinner::mount();
    let seed = fetch_user(&spinner);
    let provider = Provider::with_config(
        fields_from_json(seed)?,
        config.clone().with_label("provider"),
    );
    let page = provider.render(|| Page::mount(use_scoped_store::<Value>))?;
    let mut report = replay(&page, Scenario::Provider, config)?;
    report.rows.push(spinner.row());

    page.unmount();
    spinner.consumer.unmount();
    provider.unmount();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stable_state::EqualityPolicy;

    fn shows(report: &Report, component: &str) -> String {
        report
            .rows
            .iter()
            .find(|row| row.component == component)
            .map(|row| row.shows.clone())
            .unwrap_or_default()
    }

    #[test]
    fn factory_rerenders_only_readers() {
        let report = run_factory(&StoreConfig::default()).unwrap();
        assert_eq!(report.renders_of("age-name"), Some(5));
        assert_eq!(report.renders_of("name-input"), Some(3));
        assert_eq!(report.renders_of("age-input"), Some(3));
        assert_eq!(shows(&report, "age-name"), "Jane, 22");
        assert_eq!(shows(&report, "age-input"), "22");
    }

    #[test]
    fn skip_unchanged_drops_the_repeated_name() {
        let config = StoreConfig::new().with_equality(EqualityPolicy::SkipUnchanged);
        let report = run_factory(&config).unwrap();
        assert_eq!(report.renders_of("age-name"), Some(4));
        assert_eq!(report.renders_of("name-input"), Some(2));
        assert_eq!(report.renders_of("age-input"), Some(3));
    }

    #[test]
    fn provider_matches_factory_and_flags_loading() {
        let report = run_provider(&StoreConfig::default()).unwrap();
        assert_eq!(report.renders_of("age-name"), Some(5));
        assert_eq!(report.renders_of("name-input"), Some(3));
        assert_eq!(report.renders_of("age-input"), Some(3));
        assert_eq!(report.renders_of("spinner"), Some(3));
        assert_eq!(shows(&report, "spinner"), "idle");
        assert_eq!(shows(&report, "name-input"), "Jane");
    }

    #[test]
    fn unstable_baseline_rerenders_everything() {
        let report = run_unstable(&StoreConfig::default()).unwrap();
        for widget in Widget::ALL {
            assert_eq!(report.renders_of(widget.label()), Some(5), "{}", widget.label());
        }
        assert_eq!(shows(&report, "age-name"), "Jane, 22");

        let config = StoreConfig::new().with_equality(EqualityPolicy::SkipUnchanged);
        let report = run_unstable(&config).unwrap();
        assert_eq!(report.renders_of("name-input"), Some(4));
    }

    #[test]
    fn page_outside_provider_fails() {
        let err = Page::mount(use_scoped_store::<Value>).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn report_table_lists_components() {
        let report = run_factory(&StoreConfig::default()).unwrap();
        let table = report.to_string();
        assert!(table.starts_with("factory (equality=always, tracking=per-render, edits=4)"));
        assert!(table.contains("name-input"));
        assert!(table.contains("Jane, 22"));
    }
}
