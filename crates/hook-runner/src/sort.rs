use hook_core::Transaction;

/// Orden de ejecución por método HTTP cuando se pide `sorted`.
pub const SORTED_METHODS: [&str; 11] = ["CONNECT", "OPTIONS", "POST", "GET", "HEAD", "PUT", "PATCH", "LINK", "UNLINK",
                                        "DELETE", "TRACE"];

fn method_rank(method: &str) -> Option<usize> {
    SORTED_METHODS.iter().position(|m| *m == method)
}

/// Ordena por método de forma estable. Métodos desconocidos van primero.
pub fn sort_transactions(transactions: &mut [Transaction]) {
    // None < Some(_): los desconocidos quedan adelante
    transactions.sort_by_key(|t| method_rank(&t.request.method));
}
