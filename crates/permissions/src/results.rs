//! The permission results view.

use crate::config::ViewConfig;
use crate::enumerate::{Enumerator, Iter};
use crate::error::{translate, translate_query, Error, Result};
use crate::materialize::Materializer;
use crate::sort::{SortDescriptor, SortSpec};
use crate::value::PermissionValue;
use core::fmt;
use grantview_core::Value;
use grantview_engine::{
    change_callback, ExpressionCompiler, PredicateCompiler, QueryRoot, ResultHandle,
};
use grantview_reactive::{ChangeSet, NotificationContext, Subscription, SubscriptionManager};
use std::sync::{Arc, OnceLock};

struct ViewInner {
    handle: Arc<dyn ResultHandle>,
    subscriptions: SubscriptionManager,
    materializer: OnceLock<Materializer>,
    compiler: Arc<dyn PredicateCompiler>,
    context: NotificationContext,
    config: ViewConfig,
}

impl ViewInner {
    fn materializer(&self) -> Result<Materializer> {
        if let Some(materializer) = self.materializer.get() {
            return Ok(*materializer);
        }
        let materializer = Materializer::for_schema(&self.handle.schema())?;
        Ok(*self.materializer.get_or_init(|| materializer))
    }
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        let cancelled = self.subscriptions.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "permission view dropped, subscriptions cancelled");
        }
    }
}

/// A live, read-only collection of permissions.
///
/// Every read goes to the engine, so results always reflect the latest
/// synchronized state. Filtering and sorting return new views over the same
/// data; a view never changes its own definition.
///
/// Cloning yields another reference to the same view. The view's
/// subscriptions are cancelled when the last reference is dropped.
#[derive(Clone)]
pub struct PermissionResults {
    inner: Arc<ViewInner>,
}

impl PermissionResults {
    /// Opens the root permission view of `root`.
    ///
    /// Change notifications are delivered on `context`.
    pub fn open(root: &dyn QueryRoot, context: NotificationContext) -> Result<Self> {
        Self::open_with(
            root,
            Arc::new(ExpressionCompiler),
            context,
            ViewConfig::default(),
        )
    }

    /// Opens the root view with an explicit predicate compiler and
    /// configuration.
    pub fn open_with(
        root: &dyn QueryRoot,
        compiler: Arc<dyn PredicateCompiler>,
        context: NotificationContext,
        config: ViewConfig,
    ) -> Result<Self> {
        let handle = root.results().map_err(translate)?;
        Ok(Self::from_parts(handle, compiler, context, config))
    }

    fn from_parts(
        handle: Arc<dyn ResultHandle>,
        compiler: Arc<dyn PredicateCompiler>,
        context: NotificationContext,
        config: ViewConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                handle,
                subscriptions: SubscriptionManager::new(),
                materializer: OnceLock::new(),
                compiler,
                context,
                config,
            }),
        }
    }

    fn derive(&self, handle: Arc<dyn ResultHandle>) -> Self {
        Self::from_parts(
            handle,
            Arc::clone(&self.inner.compiler),
            self.inner.context.clone(),
            self.inner.config,
        )
    }

    /// Returns true if both values refer to the same view.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn config(&self) -> &ViewConfig {
        &self.inner.config
    }

    /// The context notifications are delivered on.
    pub fn context(&self) -> &NotificationContext {
        &self.inner.context
    }

    /// Current number of permissions.
    pub fn count(&self) -> Result<usize> {
        self.inner.handle.count().map_err(translate)
    }

    /// Returns true if the view currently holds no permissions.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Returns the permission at `index`, read from the current data.
    ///
    /// Fails with [`Error::OutOfRange`] when `index >= count()`.
    pub fn at(&self, index: usize) -> Result<PermissionValue> {
        self.inner
            .materializer()?
            .materialize(self.inner.handle.as_ref(), index)
    }

    pub fn first(&self) -> Result<Option<PermissionValue>> {
        self.optional_at(0)
    }

    pub fn last(&self) -> Result<Option<PermissionValue>> {
        match self.count()? {
            0 => Ok(None),
            count => self.optional_at(count - 1),
        }
    }

    /// Reads `index`, treating a concurrent shrink as "no value".
    fn optional_at(&self, index: usize) -> Result<Option<PermissionValue>> {
        match self.at(index) {
            Ok(value) => Ok(Some(value)),
            Err(Error::OutOfRange { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Index of the first permission structurally equal to `value`.
    ///
    /// This is a linear scan that materializes each element in turn.
    pub fn index_of(&self, value: &PermissionValue) -> Result<Option<usize>> {
        let count = self.count()?;
        for index in 0..count {
            match self.at(index) {
                Ok(candidate) if candidate == *value => return Ok(Some(index)),
                Ok(_) => {}
                Err(Error::OutOfRange { .. }) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Index of the first permission matching the predicate `expression`.
    pub fn index_of_matching(&self, expression: &str) -> Result<Option<usize>> {
        let handle = &self.inner.handle;
        let predicate = self
            .inner
            .compiler
            .compile(expression, &handle.schema())
            .map_err(translate_query)?;
        handle.index_of(&predicate).map_err(translate_query)
    }

    /// Returns a new view restricted to permissions matching `expression`.
    pub fn filtered(&self, expression: &str) -> Result<Self> {
        let handle = &self.inner.handle;
        let predicate = self
            .inner
            .compiler
            .compile(expression, &handle.schema())
            .map_err(translate_query)?;
        let filtered = handle.filter(&predicate).map_err(translate)?;
        tracing::debug!(expression, "derived filtered permission view");
        Ok(self.derive(filtered))
    }

    /// Returns a view sorted by `descriptors`.
    ///
    /// An empty list returns this same view. Every key is checked against
    /// the sort key allow-list before the engine is involved.
    pub fn sorted(&self, descriptors: &[SortDescriptor]) -> Result<Self> {
        if descriptors.is_empty() {
            return Ok(self.clone());
        }
        let spec = SortSpec::from_descriptors(descriptors)?;
        self.sorted_by_spec(&spec)
    }

    /// Returns a view sorted by a single key path.
    pub fn sorted_by_key_path(&self, key_path: &str, ascending: bool) -> Result<Self> {
        self.sorted(&[SortDescriptor::new(key_path, ascending)])
    }

    /// Returns a view sorted by already validated keys.
    pub fn sorted_by_spec(&self, spec: &SortSpec) -> Result<Self> {
        if spec.is_empty() {
            return Ok(self.clone());
        }
        let sorted = self
            .inner
            .handle
            .sort(&spec.to_columns())
            .map_err(translate)?;
        tracing::debug!(keys = ?spec.keys(), "derived sorted permission view");
        Ok(self.derive(sorted))
    }

    /// Registers `callback` for change notifications.
    ///
    /// The callback runs on this view's [`NotificationContext`], once per
    /// engine advance that changed the view, in advance order. It receives
    /// either the view and the change set, or the failure that prevented
    /// one from being computed. No notification is sent for the state at
    /// registration time.
    ///
    /// Cancelling or dropping the returned subscription stops further
    /// deliveries, and so does dropping the last reference to this view.
    /// This is at most once after cancel: a callback already running
    /// finishes, and a cancel racing in from another thread may still let
    /// one queued delivery start.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(core::result::Result<(&PermissionResults, &ChangeSet), &Error>)
            + Send
            + Sync
            + 'static,
    {
        let cell = self.inner.subscriptions.register();
        let callback = Arc::new(callback);

        let view = Arc::downgrade(&self.inner);
        let context = self.inner.context.clone();
        let delivery_cell = Arc::clone(&cell);
        let delivery_callback = Arc::clone(&callback);
        let engine_callback = change_callback(move |outcome| {
            if !delivery_cell.is_active() {
                return;
            }
            let outcome = match outcome {
                Ok(changes) => Ok(changes.clone()),
                Err(err) => {
                    let err = translate(err.clone());
                    tracing::warn!(
                        subscription = delivery_cell.id(),
                        error = %err,
                        "engine failure delivered to subscriber"
                    );
                    Err(err)
                }
            };
            let cell = Arc::clone(&delivery_cell);
            let view = view.clone();
            let callback = Arc::clone(&delivery_callback);
            context.post(Box::new(move || {
                if !cell.is_active() {
                    return;
                }
                match outcome {
                    Ok(changes) => {
                        let Some(inner) = view.upgrade() else {
                            return;
                        };
                        let view = PermissionResults { inner };
                        tracing::trace!(
                            subscription = cell.id(),
                            changes = changes.len(),
                            "delivering change notification"
                        );
                        callback(Ok((&view, &changes)));
                    }
                    Err(err) => callback(Err(&err)),
                }
            }));
        });

        match self.inner.handle.add_change_callback(engine_callback) {
            Ok(token) => cell.attach(Box::new(move || token.cancel())),
            Err(err) => {
                let err = translate(err);
                tracing::warn!(
                    subscription = cell.id(),
                    error = %err,
                    "engine refused change callback registration"
                );
                let failed_cell = Arc::clone(&cell);
                self.inner.context.post(Box::new(move || {
                    if failed_cell.is_active() {
                        callback(Err(&err));
                    }
                }));
            }
        }

        tracing::debug!(subscription = cell.id(), "subscribed to permission view");
        Subscription::new(cell)
    }

    /// Number of subscriptions of this view that are still active.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Returns true once the underlying engine handle can no longer be read.
    pub fn is_invalidated(&self) -> bool {
        !self.inner.handle.is_valid()
    }

    /// Starts a bounded-buffer enumeration over the current elements.
    pub fn enumerate(&self) -> Result<Enumerator<'_>> {
        Enumerator::new(self, self.inner.config.batch_size())
    }

    /// Iterates over the elements present when iteration starts.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Always `None`: permissions have no meaningful minimum.
    pub fn min(&self, _property: &str) -> Option<Value> {
        None
    }

    /// Always `None`: permissions have no meaningful maximum.
    pub fn max(&self, _property: &str) -> Option<Value> {
        None
    }

    /// Always `None`: permissions cannot be summed.
    pub fn sum(&self, _property: &str) -> Option<Value> {
        None
    }

    /// Always `None`: permissions cannot be averaged.
    pub fn average(&self, _property: &str) -> Option<Value> {
        None
    }

    /// Dynamic attribute access is not supported.
    pub fn value_for_key(&self, _key: &str) -> Result<Vec<Value>> {
        Err(Error::unsupported("value_for_key"))
    }

    /// Dynamic attribute updates are not supported; permission results are
    /// read-only.
    pub fn set_value_for_key(&self, _key: &str, _value: Value) -> Result<()> {
        Err(Error::unsupported("set_value_for_key"))
    }
}

impl<'a> IntoIterator for &'a PermissionResults {
    type Item = Result<PermissionValue>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for PermissionResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionResults")
            .field("count", &self.count().ok())
            .field("subscriptions", &self.subscription_count())
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}

impl fmt::Display for PermissionResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = match self.count() {
            Ok(count) => count,
            Err(_) => return f.write_str("PermissionResults <invalidated>"),
        };
        let limit = self.inner.config.max_described();
        writeln!(f, "PermissionResults <{}> (", count)?;
        for index in 0..count.min(limit) {
            match self.at(index) {
                Ok(value) => writeln!(f, "\t[{}] {}", index, value)?,
                Err(err) => writeln!(f, "\t[{}] <{}>", index, err)?,
            }
        }
        if count > limit {
            writeln!(f, "\t... {} objects skipped.", count - limit)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{permission_table, AccessLevel};
    use grantview_engine::MemoryEngine;

    fn view_with(values: &[PermissionValue], config: ViewConfig) -> (MemoryEngine, PermissionResults) {
        let engine = MemoryEngine::new(permission_table());
        for value in values {
            engine.insert(value.to_values()).unwrap();
        }
        let view = PermissionResults::open_with(
            &engine,
            Arc::new(ExpressionCompiler),
            NotificationContext::new("test"),
            config,
        )
        .unwrap();
        (engine, view)
    }

    fn sample() -> Vec<PermissionValue> {
        vec![
            PermissionValue::new("/~/b", "bob", AccessLevel::Read, 30),
            PermissionValue::new("/~/a", "alice", AccessLevel::Write, 10),
            PermissionValue::new("/shared", "carol", AccessLevel::Admin, 20),
        ]
    }

    #[test]
    fn test_count_and_at() {
        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        assert_eq!(view.count().unwrap(), 3);
        assert_eq!(view.at(1).unwrap(), sample()[1]);
        assert_eq!(
            view.at(3).unwrap_err(),
            Error::OutOfRange { index: 3, count: 3 }
        );
    }

    #[test]
    fn test_first_last() {
        let (_engine, empty) = view_with(&[], ViewConfig::default());
        assert_eq!(empty.first().unwrap(), None);
        assert_eq!(empty.last().unwrap(), None);

        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        assert_eq!(view.first().unwrap(), Some(sample()[0].clone()));
        assert_eq!(view.last().unwrap(), Some(sample()[2].clone()));
    }

    #[test]
    fn test_sorted_empty_is_same_view() {
        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        assert!(view.sorted(&[]).unwrap().ptr_eq(&view));
        assert!(view.sorted_by_spec(&SortSpec::default()).unwrap().ptr_eq(&view));
    }

    #[test]
    fn test_sorted_by_key_path() {
        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        let sorted = view.sorted_by_key_path("updatedAt", false).unwrap();
        let times: Vec<i64> = sorted.iter().map(|v| v.unwrap().updated_at()).collect();
        assert_eq!(times, vec![30, 20, 10]);
        assert!(!sorted.ptr_eq(&view));

        assert_eq!(
            view.sorted_by_key_path("accessLevel", true).unwrap_err(),
            Error::invalid_sort_key("accessLevel")
        );
    }

    #[test]
    fn test_filtered_and_query_errors() {
        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        let mine = view.filtered("path BEGINSWITH '/~/'").unwrap();
        assert_eq!(mine.count().unwrap(), 2);

        assert!(matches!(view.filtered("owner == 'x'"), Err(Error::Query { .. })));
        assert!(matches!(view.filtered("path =="), Err(Error::Query { .. })));
        assert!(matches!(
            view.index_of_matching("accessLevel == 'high'"),
            Err(Error::Query { .. })
        ));
    }

    #[test]
    fn test_index_of() {
        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        assert_eq!(view.index_of(&sample()[2]).unwrap(), Some(2));
        let stranger = PermissionValue::new("/~/a", "alice", AccessLevel::Read, 10);
        assert_eq!(view.index_of(&stranger).unwrap(), None);
        assert_eq!(view.index_of_matching("userId == 'alice'").unwrap(), Some(1));
        assert_eq!(view.index_of_matching("userId == 'dave'").unwrap(), None);
    }

    #[test]
    fn test_rejected_operations() {
        let (_engine, view) = view_with(&sample(), ViewConfig::default());
        assert_eq!(view.min("updatedAt"), None);
        assert_eq!(view.max("updatedAt"), None);
        assert_eq!(view.sum("path"), None);
        assert_eq!(view.average("accessLevel"), None);
        assert_eq!(
            view.value_for_key("path").unwrap_err(),
            Error::unsupported("value_for_key")
        );
        assert!(matches!(
            view.set_value_for_key("path", Value::from("/x")),
            Err(Error::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_invalidated_view() {
        let (engine, view) = view_with(&sample(), ViewConfig::default());
        assert!(!view.is_invalidated());
        engine.close();
        assert!(view.is_invalidated());
        assert!(matches!(view.count(), Err(Error::Generic { .. })));
        assert!(matches!(view.at(0), Err(Error::Generic { .. })));
        assert_eq!(view.to_string(), "PermissionResults <invalidated>");
    }

    #[test]
    fn test_display_elides() {
        let (_engine, view) = view_with(&sample(), ViewConfig::new().description_limit(1));
        let text = view.to_string();
        assert!(text.starts_with("PermissionResults <3> (\n\t[0] Permission { path: \"/~/b\""));
        assert!(text.contains("... 2 objects skipped."));
        assert!(text.ends_with(')'));
    }
}
