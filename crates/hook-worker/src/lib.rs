//! hook-worker: hooks escritos en otros lenguajes, ejecutados por un
//! handler externo.
//!
//! Flujo: resolver el comando del handler según el lenguaje, lanzarlo con
//! los hookfiles como argumentos, conectarse por TCP con reintentos y
//! registrar en el `HookRegistry` un hook por cada fase del protocolo. Cada
//! invocación viaja como una línea JSON `{event, uuid, data}` y espera la
//! respuesta con el mismo `uuid`.
pub mod client;
pub mod command;
pub mod connection;
pub mod errors;
pub mod hook;
pub mod protocol;

pub use client::HooksWorkerClient;
pub use command::{resolve_handler_command, HandlerCommand};
pub use connection::{CallOutcome, WorkerConnection};
pub use errors::WorkerError;
pub use hook::WorkerHook;
pub use protocol::{MessageBuffer, OutgoingMessage, DELIMITER};
