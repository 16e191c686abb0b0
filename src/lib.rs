//! Sandboxed, pausable interpreter for a JavaScript subset
//!
//! Scripts run inside an [`Interpreter`] that only exposes the functions the
//! host injects. Evaluation is async and single threaded; a
//! [`PauseController`] can stop a running script at a node boundary,
//! serialize its state and resume it later, possibly in another process.
//!
//! # Example
//!
//! ```
//! use sandrun::{Interpreter, Value};
//!
//! let interp = Interpreter::new();
//! let result = interp.evaluate_sync("let x = 10; let y = x * 2; y + 5").unwrap();
//! assert_eq!(result, Value::Number(25.0));
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod pause;
pub mod snapshot;
pub mod value;

pub use config::InterpreterConfig;
pub use context::{BindingKind, ContextId};
pub use error::{ErrorKind, ScriptError};
pub use interpreter::Interpreter;
pub use module::{MemoryResolver, ModuleResolver, ResolvedModule};
pub use parser::{DefaultParser, SourceParser};
pub use pause::{ExecutionState, ExecutionStatus, PauseController, RunResult};
pub use snapshot::{DeserializeOptions, SerializedState};
pub use value::{CheapClone, JsString, NativeFunction, NativeReturn, Value};
