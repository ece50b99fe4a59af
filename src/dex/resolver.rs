//! Memoized, human-readable forms derived from the index tables.
//!
//! Rows only hold indices; names such as `Lpkg/Cls;->name(I)V` are assembled on demand by
//! following those indices through the string, type and proto tables. The results are cached
//! per row in concurrent maps owned by the [`crate::DexFile`], so repeated lookups (also from
//! rayon worker threads) are cheap and rows themselves stay immutable.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{DexFile, Result};

/// Caches of derived names, keyed by row index.
#[derive(Debug, Default)]
pub struct Resolver {
    method_class_names: DashMap<u32, Arc<str>>,
    proto_descriptors: DashMap<u32, Arc<str>>,
    field_references: DashMap<u32, Arc<str>>,
    method_references: DashMap<u32, Arc<str>>,
}

fn memoized<F>(cache: &DashMap<u32, Arc<str>>, key: u32, compute: F) -> Result<Arc<str>>
where
    F: FnOnce() -> Result<String>,
{
    if let Some(value) = cache.get(&key) {
        return Ok(Arc::clone(value.value()));
    }

    let value: Arc<str> = compute()?.into();
    Ok(Arc::clone(cache.entry(key).or_insert(value).value()))
}

impl Resolver {
    /// Creates empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Type descriptor of the class declaring method `method_idx`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the method does not exist.
    pub fn method_class_name(&self, dex: &DexFile, method_idx: u32) -> Result<Arc<str>> {
        memoized(&self.method_class_names, method_idx, || {
            let method = dex.methods().resolve(method_idx, 0)?;
            Ok(dex
                .type_descriptor(u32::from(method.class_idx))?
                .to_owned())
        })
    }

    /// Descriptor of proto `proto_idx`, e.g. `(ILjava/lang/String;)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the proto does not exist.
    pub fn proto_descriptor(&self, dex: &DexFile, proto_idx: u32) -> Result<Arc<str>> {
        memoized(&self.proto_descriptors, proto_idx, || {
            let proto = dex.protos().resolve(proto_idx, 0)?;
            let mut descriptor = String::from("(");
            if let Some(parameters) = proto.parameters {
                let list: &crate::dex::heap::TypeList = dex.heap().item(parameters)?;
                for &type_idx in &list.type_idx {
                    descriptor.push_str(dex.type_descriptor(u32::from(type_idx))?);
                }
            }
            descriptor.push(')');
            descriptor.push_str(dex.type_descriptor(proto.return_type_idx)?);
            Ok(descriptor)
        })
    }

    /// Reference form of field `field_idx`, e.g. `Lpkg/Cls;->name:I`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the field does not exist.
    pub fn field_reference(&self, dex: &DexFile, field_idx: u32) -> Result<Arc<str>> {
        memoized(&self.field_references, field_idx, || {
            let field = dex.fields().resolve(field_idx, 0)?;
            Ok(format!(
                "{}->{}:{}",
                dex.type_descriptor(u32::from(field.class_idx))?,
                dex.string(field.name_idx)?,
                dex.type_descriptor(u32::from(field.type_idx))?
            ))
        })
    }

    /// Reference form of method `method_idx`, e.g. `Lpkg/Cls;->name(I)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOutOfRange`] if the method does not exist.
    pub fn method_reference(&self, dex: &DexFile, method_idx: u32) -> Result<Arc<str>> {
        memoized(&self.method_references, method_idx, || {
            let method = dex.methods().resolve(method_idx, 0)?;
            let class = self.method_class_name(dex, method_idx)?;
            let proto = self.proto_descriptor(dex, u32::from(method.proto_idx))?;
            Ok(format!("{}->{}{}", class, dex.string(method.name_idx)?, proto))
        })
    }

    /// Number of cached entries over all caches.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.method_class_names.len()
            + self.proto_descriptors.len()
            + self.field_references.len()
            + self.method_references.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rayon::prelude::*;

    use crate::{test::DexBuilder, DexFile, Error};

    #[test]
    fn memoized_identity() {
        let mut builder = DexBuilder::new();
        let method = builder.method("Lcom/example/Foo;", "run", "V", &["I"]);
        let dex = DexFile::decode(&builder.build()).unwrap();

        let first = dex.method_reference(method).unwrap();
        let second = dex.method_reference(method).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(&*first, "Lcom/example/Foo;->run(I)V");
        // method reference, class name and proto descriptor
        assert_eq!(dex.resolver().cached(), 3);
    }

    #[test]
    fn concurrent_lookups() {
        let mut builder = DexBuilder::new();
        let methods: Vec<u32> = (0..32)
            .map(|i| builder.method("LFoo;", &format!("m{i}"), "J", &["Z", "[B"]))
            .collect();
        let dex = DexFile::decode(&builder.build()).unwrap();

        let names: Vec<Arc<str>> = methods
            .par_iter()
            .map(|&method| dex.method_reference(method).unwrap())
            .collect();
        assert_eq!(&*names[7], "LFoo;->m7(Z[B)J");
        assert!(Arc::ptr_eq(&names[3], &dex.method_reference(methods[3]).unwrap()));
    }

    #[test]
    fn missing_rows() {
        let dex = DexFile::decode(&DexBuilder::new().class("LFoo;").build()).unwrap();
        assert!(matches!(
            dex.method_reference(0),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            dex.field_reference(3),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            dex.proto_descriptor(0),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert_eq!(dex.resolver().cached(), 0);
    }
}
