//! Código JS inyectado antes de cada script del sandbox.

/// `log`, `AssertionError` y la familia `assert`.
pub(crate) const PRELUDE: &str = r#"
var __logs = [];
function log(content) {
  var text = typeof content === 'string' ? content : JSON.stringify(content);
  __logs.push({ timestamp: Date.now(), content: text === undefined ? String(content) : text });
}
class AssertionError extends Error {
  constructor(message) { super(message); this.name = 'AssertionError'; }
}
function __show(value) {
  try { var s = JSON.stringify(value); return s === undefined ? String(value) : s; } catch (e) { return String(value); }
}
function __fail(message, fallback) { throw new AssertionError(message || fallback); }
function assert(value, message) {
  if (!value) __fail(message, 'expected ' + __show(value) + ' to be truthy');
}
assert.ok = assert;
assert.equal = function (actual, expected, message) {
  if (actual != expected) __fail(message, 'expected ' + __show(actual) + ' to equal ' + __show(expected));
};
assert.strictEqual = function (actual, expected, message) {
  if (actual !== expected) __fail(message, 'expected ' + __show(actual) + ' to equal ' + __show(expected));
};
assert.notEqual = function (actual, expected, message) {
  if (actual == expected) __fail(message, 'expected ' + __show(actual) + ' to not equal ' + __show(expected));
};
assert.deepEqual = function (actual, expected, message) {
  if (__show(actual) !== __show(expected)) __fail(message, 'expected ' + __show(actual) + ' to deeply equal ' + __show(expected));
};
assert.fail = function (message) { __fail(message, 'assert.fail()'); };
"#;

/// Funciones de registro disponibles al evaluar un archivo de hooks.
pub(crate) const REGISTRATION: &str = r#"
var __hooks = {
  beforeAllHooks: [], afterAllHooks: [],
  beforeEachHooks: [], beforeEachValidationHooks: [], afterEachHooks: [],
  beforeHooks: Object.create(null), beforeValidationHooks: Object.create(null), afterHooks: Object.create(null)
};
function __named(bucket, name, fn) {
  var list = __hooks[bucket][name] || (__hooks[bucket][name] = []);
  list.push(String(fn));
}
function before(name, fn) { __named('beforeHooks', name, fn); }
function beforeValidation(name, fn) { __named('beforeValidationHooks', name, fn); }
function after(name, fn) { __named('afterHooks', name, fn); }
function beforeAll(fn) { __hooks.beforeAllHooks.push(String(fn)); }
function afterAll(fn) { __hooks.afterAllHooks.push(String(fn)); }
function beforeEach(fn) { __hooks.beforeEachHooks.push(String(fn)); }
function beforeEachValidation(fn) { __hooks.beforeEachValidationHooks.push(String(fn)); }
function afterEach(fn) { __hooks.afterEachHooks.push(String(fn)); }
"#;
