//! Variante etiquetada de hook y objetivo sobre el que opera.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::context::HookContext;
use crate::errors::{CoreError, HookError};
use crate::model::Transaction;

/// Lo que recibe un hook: una transacción o el arreglo completo.
#[derive(Debug)]
pub enum HookTarget<'a> {
    Transaction(&'a mut Transaction),
    Transactions(&'a mut [Transaction]),
}

impl HookTarget<'_> {
    /// Transacciones en alcance (una sola para fases por transacción).
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            HookTarget::Transaction(t) => std::slice::from_ref(&**t),
            HookTarget::Transactions(list) => &**list,
        }
    }

    pub fn transactions_mut(&mut self) -> &mut [Transaction] {
        match self {
            HookTarget::Transaction(t) => std::slice::from_mut(&mut **t),
            HookTarget::Transactions(list) => &mut **list,
        }
    }

    pub fn transaction_mut(&mut self) -> Option<&mut Transaction> {
        match self {
            HookTarget::Transaction(t) => Some(&mut **t),
            HookTarget::Transactions(_) => None,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, HookTarget::Transaction(_))
    }

    /// Vista JSON de lo que se le pasa al hook.
    pub fn to_value(&self) -> Result<Value, CoreError> {
        match self {
            HookTarget::Transaction(t) => t.to_value(),
            HookTarget::Transactions(list) => Ok(Value::Array(list.iter()
                                                                .map(Transaction::to_value)
                                                                .collect::<Result<_, _>>()?)),
        }
    }

    /// Fusiona el resultado de un hook sobre los objetos vivos.
    ///
    /// Para arreglos la fusión es posicional. Se valida todo antes de tocar
    /// nada: o se aplican todos los elementos o ninguno.
    pub fn apply(&mut self, reply: &Value) -> Result<(), CoreError> {
        match self {
            HookTarget::Transaction(t) => t.merge_value(reply),
            HookTarget::Transactions(list) => {
                let Value::Array(items) = reply else {
                    return Err(CoreError::InvalidTransaction(format!("expected an array, got {reply}")));
                };
                let mut merged = Vec::with_capacity(list.len());
                for (index, transaction) in list.iter().enumerate() {
                    let mut copy = transaction.clone();
                    if let Some(item) = items.get(index) {
                        copy.merge_value(item)?;
                    }
                    merged.push(copy);
                }
                for (slot, updated) in list.iter_mut().zip(merged) {
                    *slot = updated;
                }
                Ok(())
            }
        }
    }
}

/// Hook nativo (en proceso). Implementado por closures Rust y por el
/// cliente de workers.
#[async_trait]
pub trait HookCallback: Send + Sync {
    async fn call(&self, target: &mut HookTarget<'_>, context: &mut HookContext) -> Result<(), HookError>;
}

/// Adaptador de closure síncrona a `HookCallback`.
pub struct FnHook<F>(pub F);

#[async_trait]
impl<F> HookCallback for FnHook<F>
    where F: Fn(&mut HookTarget<'_>, &mut HookContext) -> Result<(), HookError> + Send + Sync
{
    async fn call(&self, target: &mut HookTarget<'_>, context: &mut HookContext) -> Result<(), HookError> {
        (self.0)(target, context)
    }
}

#[derive(Clone)]
pub enum Hook {
    Native(Arc<dyn HookCallback>),
    /// Texto fuente de una función, evaluado en el sandbox.
    Sandboxed(String),
}

impl Hook {
    pub fn native<F>(f: F) -> Self
        where F: Fn(&mut HookTarget<'_>, &mut HookContext) -> Result<(), HookError> + Send + Sync + 'static
    {
        Hook::Native(Arc::new(FnHook(f)))
    }

    pub fn callback<C>(callback: C) -> Self
        where C: HookCallback + 'static
    {
        Hook::Native(Arc::new(callback))
    }

    pub fn sandboxed(source: impl Into<String>) -> Self {
        Hook::Sandboxed(source.into())
    }

    pub fn is_sandboxed(&self) -> bool {
        matches!(self, Hook::Sandboxed(_))
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Native(_) => f.write_str("Hook::Native(..)"),
            Hook::Sandboxed(source) => f.debug_tuple("Hook::Sandboxed").field(source).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_apply_is_positional_and_all_or_nothing() {
        let mut list = vec![Transaction::named("A"), Transaction::named("B")];
        let mut target = HookTarget::Transactions(&mut list);
        target.apply(&json!([{ "name": "A2" }, { "skip": true }, { "name": "ignored" }])).unwrap();
        assert_eq!(list[0].name, "A2");
        assert!(list[1].skip);

        let mut target = HookTarget::Transactions(&mut list);
        let err = target.apply(&json!([{ "name": "A3" }, { "port": -1 }]));
        assert!(err.is_err());
        assert_eq!(list[0].name, "A2", "nothing applied when one element is invalid");
    }

    #[test]
    fn single_target_exposes_one_transaction() {
        let mut t = Transaction::named("T");
        let mut target = HookTarget::Transaction(&mut t);
        assert!(target.is_single());
        target.transactions_mut()[0].skip = true;
        assert_eq!(target.transactions().len(), 1);
        assert!(t.skip);
    }

    #[tokio::test]
    async fn closure_hook_runs_through_callback_trait() {
        let hook = Hook::native(|target, ctx| {
            if let Some(t) = target.transaction_mut() {
                t.name = "renamed".into();
            }
            ctx.log("ran");
            Ok(())
        });
        let Hook::Native(callback) = hook else { panic!("expected native hook") };
        let mut t = Transaction::named("T");
        let mut ctx = HookContext::new();
        callback.call(&mut HookTarget::Transaction(&mut t), &mut ctx).await.unwrap();
        assert_eq!(t.name, "renamed");
        assert_eq!(ctx.logs().len(), 1);
    }
}
