pub use crate::bridge::{BridgeState, FormWatch, KeySource, watch_form};
pub use crate::builder::{build, build_json, build_with_data};
pub use crate::effects::{Dispose, Subscription};
pub use crate::error::{SchemaError, ValueError};
pub use crate::node::{FormArray, FormControl, FormGroup, NodeFlags, NodeStatus, StateNode};
pub use crate::registry::{CreateOptions, FormKey, FormRegistry, RegistryConfig};
pub use crate::schema::Schema;
pub use crate::scope::{Scope, current_scope};
pub use crate::signal::{Signal, signal};
pub use crate::validation::{ValidationErrors, Validator, ValidatorSet};
pub use crate::value::FormValue;
