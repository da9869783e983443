use std::any::{Any, type_name};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::asset::cache::CloneLease;

pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Anything a loader can produce.
pub trait Asset: AsAny + fmt::Debug {
    /// Smart assets hand every consumer its own copy, while the cache keeps the canonical one.
    fn is_smart_clone(&self) -> bool {
        false
    }

    /// A structurally equal, independently owned copy. Used by the cloneable processor.
    fn clone_asset(&self) -> Option<AssetRef> {
        None
    }
}

pub type AssetRef = Arc<dyn Asset>;

impl Asset for String {}

impl Asset for Vec<u8> {}

/// Result of a resolution. When it originates from a clone-tracked cache, it keeps the cache
/// entry alive until the last copy of the handle is dropped.
#[derive(Clone)]
pub struct LoadedAsset {
    value: AssetRef,
    lease: Option<Arc<CloneLease>>,
}

impl LoadedAsset {
    pub(crate) fn shared(value: AssetRef) -> Self {
        Self { value, lease: None }
    }

    pub(crate) fn leased(value: AssetRef, lease: Arc<CloneLease>) -> Self {
        Self {
            value,
            lease: Some(lease),
        }
    }

    pub fn value(&self) -> &AssetRef {
        &self.value
    }

    pub fn is_tracked(&self) -> bool {
        self.lease.is_some()
    }

    /// Reference identity, not structural equality.
    pub fn ptr_eq(&self, other: &LoadedAsset) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub fn downcast_ref<T: Asset>(&self) -> Option<&T> {
        (*self.value).as_any().downcast_ref::<T>()
    }

    pub fn downcast<T: Asset>(self) -> Result<TypedAsset<T>, LoadedAsset> {
        if !(*self.value).as_any().is::<T>() {
            return Err(self);
        }

        let LoadedAsset { value, lease } = self;
        match value.into_any_arc().downcast::<T>() {
            Ok(value) => Ok(TypedAsset { value, lease }),
            // checked above
            Err(_) => unreachable!("type check passed for {}", type_name::<T>()),
        }
    }
}

impl Deref for LoadedAsset {
    type Target = dyn Asset;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref()
    }
}

impl fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("value", &self.value)
            .field("tracked", &self.lease.is_some())
            .finish()
    }
}

/// A [`LoadedAsset`] that has been downcast to its concrete type.
pub struct TypedAsset<T> {
    value: Arc<T>,
    lease: Option<Arc<CloneLease>>,
}

impl<T> TypedAsset<T> {
    pub fn arc(&self) -> &Arc<T> {
        &self.value
    }

    pub fn ptr_eq(&self, other: &TypedAsset<T>) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub fn is_tracked(&self) -> bool {
        self.lease.is_some()
    }
}

impl<T> Clone for TypedAsset<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            lease: self.lease.clone(),
        }
    }
}

impl<T> Deref for TypedAsset<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for TypedAsset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}
