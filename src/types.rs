use indexmap::{IndexMap, IndexSet};
use fxhash::{FxHashMap, FxHashSet, FxBuildHasher};

pub type StrHashSet = FxHashSet::<String>;
pub type StrHashMap<T> = FxHashMap::<String, T>;

pub type StrIndexSet = IndexSet::<String, FxBuildHasher>;
pub type StrIndexMap<T> = IndexMap::<String, T, FxBuildHasher>;
