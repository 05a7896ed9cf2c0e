use std::fmt;

/// Punto del ciclo de vida donde corre un hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeAll,
    BeforeEach,
    Before,
    BeforeEachValidation,
    BeforeValidation,
    AfterEach,
    After,
    AfterAll,
}

impl HookPhase {
    /// Orden de ejecución dentro de una corrida.
    pub const ALL: [HookPhase; 8] = [HookPhase::BeforeAll,
                                     HookPhase::BeforeEach,
                                     HookPhase::Before,
                                     HookPhase::BeforeEachValidation,
                                     HookPhase::BeforeValidation,
                                     HookPhase::AfterEach,
                                     HookPhase::After,
                                     HookPhase::AfterAll];

    /// Nombre de evento usado en el protocolo de workers y en los mensajes.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::BeforeAll => "beforeAll",
            HookPhase::BeforeEach => "beforeEach",
            HookPhase::Before => "before",
            HookPhase::BeforeEachValidation => "beforeEachValidation",
            HookPhase::BeforeValidation => "beforeValidation",
            HookPhase::AfterEach => "afterEach",
            HookPhase::After => "after",
            HookPhase::AfterAll => "afterAll",
        }
    }

    /// Fases indexadas además por nombre de transacción.
    pub fn is_named(&self) -> bool {
        matches!(self, HookPhase::Before | HookPhase::BeforeValidation | HookPhase::After)
    }

    /// Fases que reciben el arreglo completo de transacciones.
    pub fn targets_all(&self) -> bool {
        matches!(self, HookPhase::BeforeAll | HookPhase::AfterAll)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
