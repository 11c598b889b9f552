use std::cell::RefCell;
use std::rc::Rc;

use reform_core::prelude::*;
use reform_devtools::Inspector;
use serde_json::json;

#[derive(Clone, Debug)]
enum Action {
    OpenEditor { entity: String },
    Select(Option<String>),
    Rename { title: String },
    Delete { entity: String },
}

/// Application state. Only the selection is observable; the forms live in
/// the registry.
struct AppState {
    selected: Signal<Option<FormKey>>,
    opened: Vec<String>,
}

type Effect = Box<dyn Fn(&Action, &Store)>;

/// Reducer first, then effects. Effects may dispatch.
struct Store {
    state: RefCell<AppState>,
    registry: FormRegistry,
    schema: Schema,
    effects: Vec<Effect>,
}

impl Store {
    fn new(registry: FormRegistry, schema: Schema, effects: Vec<Effect>) -> Self {
        Self {
            state: RefCell::new(AppState {
                selected: signal(None),
                opened: Vec::new(),
            }),
            registry,
            schema,
            effects,
        }
    }

    fn selected(&self) -> Signal<Option<FormKey>> {
        self.state.borrow().selected.clone()
    }

    fn dispatch(&self, action: Action) {
        log::info!("dispatch {action:?}");
        self.reduce(&action);
        for effect in &self.effects {
            effect(&action, self);
        }
    }

    fn reduce(&self, action: &Action) {
        let selected = {
            let mut state = self.state.borrow_mut();
            match action {
                Action::OpenEditor { entity } => {
                    if !state.opened.contains(entity) {
                        state.opened.push(entity.clone());
                    }
                    None
                }
                Action::Select(entity) => Some(entity.as_deref().map(|e| editor_key(e).into())),
                Action::Delete { entity } => {
                    state.opened.retain(|e| e != entity);
                    let key = editor_key(entity);
                    let was_selected = state
                        .selected
                        .with(|s| s.as_ref().is_some_and(|k| k.as_str() == key));
                    was_selected.then_some(None)
                }
                Action::Rename { .. } => None,
            }
        };
        // set with the state borrow released; watches run synchronously
        if let Some(next) = selected {
            self.selected().set(next);
        }
    }
}

fn effects() -> Vec<Effect> {
    vec![
        Box::new(open_editor) as Effect,
        Box::new(rename_selected) as Effect,
        Box::new(drop_editor) as Effect,
    ]
}

/// Create the editor form, then select it.
fn open_editor(action: &Action, store: &Store) {
    if let Action::OpenEditor { entity } = action {
        let key = store.registry.create_and_register_form(
            &store.schema,
            CreateOptions::new()
                .with_key(editor_key(entity))
                .with_initial_data(FormValue::map([("title", FormValue::from(entity.as_str()))])),
        );
        log::info!("editor ready at {key}");
        store.dispatch(Action::Select(Some(entity.clone())));
    }
}

fn rename_selected(action: &Action, store: &Store) {
    if let Action::Rename { title } = action
        && let Some(form) = store.selected().get().and_then(|k| store.registry.get_form(&k))
    {
        form.patch_value(FormValue::map([("title", FormValue::from(title.as_str()))]));
        form.mark_as_touched();
    }
}

fn drop_editor(action: &Action, store: &Store) {
    if let Action::Delete { entity } = action {
        store.registry.remove_form(editor_key(entity));
    }
}

fn editor_key(entity: &str) -> String {
    format!("editor/{entity}")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let validators = ValidatorSet::new()
        .with("required", Validator::rule("required", |v| !v.is_empty_value()))
        .with(
            "positive",
            Validator::rule("positive", |v| v.as_f64().is_some_and(|n| n > 0.0)),
        );
    let schema = Schema::from_json(
        &json!({
            "type": "Group",
            "fields": {
                "title": {"type": "Field", "initialValue": "", "options": {"validators": ["required"]}},
                "price": {"type": "Field", "initialValue": 1.5, "options": {"validators": ["positive"]}},
                "tags": {"type": "Array", "items": ["new"]}
            }
        }),
        &validators,
    )?;

    let registry = FormRegistry::new();
    let store = Store::new(registry.clone(), schema, effects());

    let view = Scope::new();
    let emissions = Rc::new(RefCell::new(0usize));
    registry
        .watch(&store.selected(), {
            let emissions = emissions.clone();
            move |form| {
                *emissions.borrow_mut() += 1;
                match form {
                    Some(form) => log::info!(
                        "editor: {} ({:?}, touched: {}, dirty: {})",
                        form.value(),
                        form.status(),
                        form.touched(),
                        form.dirty()
                    ),
                    None => log::info!("editor: nothing selected"),
                }
            }
        })
        .attach_to(&view);

    store.dispatch(Action::OpenEditor {
        entity: "lamp".into(),
    });
    store.dispatch(Action::Rename { title: String::new() });
    store.dispatch(Action::OpenEditor {
        entity: "desk".into(),
    });
    // reopening keeps the edits made so far
    store.dispatch(Action::OpenEditor {
        entity: "lamp".into(),
    });
    store.dispatch(Action::Delete {
        entity: "lamp".into(),
    });
    store.dispatch(Action::Select(Some("lamp".into())));

    let mut inspector = Inspector::new();
    inspector.toggle();
    inspector.log_snapshot(&registry);
    for key in registry.keys() {
        if let Some(form) = registry.get_form(&key) {
            log::info!(
                "saved {} = {}",
                serde_json::to_string(&key)?,
                serde_json::to_string(&form.value())?
            );
        }
    }

    view.dispose();
    store.dispatch(Action::Select(Some("desk".into())));
    log::info!("{} emissions while the view was alive", emissions.borrow());
    Ok(())
}
