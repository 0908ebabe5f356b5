pub(crate) const ERR_DEREF_NULL: &str =
    "dereferenced a Shared handle that is empty or does not observe a pointee";
