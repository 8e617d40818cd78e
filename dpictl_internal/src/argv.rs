use std::collections::TryReserveError;

/// Why an [`ArgumentVector`] could not be built.
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    /// The host supplied no arguments at all.
    #[error("invalid args count: 0")]
    Empty,
    /// An argument cannot be passed through a C-style `argv`.
    #[error("argument at index {index} contains a NUL byte")]
    InteriorNul { index: usize },
    /// The vector itself could not be allocated.
    #[error("failed to allocate memory for argv")]
    Vector(#[source] TryReserveError),
    /// One of the arguments could not be duplicated.
    #[error("failed to duplicate string at index {index}")]
    Duplicate {
        index: usize,
        #[source]
        source: TryReserveError,
    },
}

/// An owned, ordered argument vector for an engine's entry point.
///
/// Every present argument is an independently owned buffer. Absent host values are kept
/// as explicit empty slots rather than dropped, so indices line up with what the host
/// passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector {
    slots: Vec<Option<String>>,
}

fn duplicate(arg: &str) -> Result<String, TryReserveError> {
    let mut owned = String::new();
    owned.try_reserve_exact(arg.len())?;
    owned.push_str(arg);
    Ok(owned)
}

impl ArgumentVector {
    /// Copies the host's arguments into a fresh vector.
    ///
    /// Allocation is fallible: if the vector or any argument cannot be allocated, every
    /// buffer built so far is released and nothing is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use dpictl_internal::argv::ArgumentVector;
    ///
    /// let argv = ArgumentVector::marshal(&[Some("ciadpi"), None, Some("--port")]).unwrap();
    /// assert_eq!(argv.len(), 3);
    /// assert_eq!(argv.get(1), None);
    /// assert_eq!(argv.get(2), Some("--port"));
    /// ```
    pub fn marshal<S: AsRef<str>>(args: &[Option<S>]) -> Result<ArgumentVector, MarshalError> {
        Self::marshal_with(args, duplicate)
    }

    fn marshal_with<S, F>(
        args: &[Option<S>],
        mut duplicate: F,
    ) -> Result<ArgumentVector, MarshalError>
    where
        S: AsRef<str>,
        F: FnMut(&str) -> Result<String, TryReserveError>,
    {
        if args.is_empty() {
            return Err(MarshalError::Empty);
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(args.len())
            .map_err(MarshalError::Vector)?;
        // early returns drop `slots`, which releases every buffer built so far
        for (index, arg) in args.iter().enumerate() {
            let slot = match arg {
                None => None,
                Some(arg) => {
                    let arg = arg.as_ref();
                    if arg.contains('\0') {
                        return Err(MarshalError::InteriorNul { index });
                    }
                    let owned =
                        duplicate(arg).map_err(|source| MarshalError::Duplicate { index, source })?;
                    Some(owned)
                }
            };
            slots.push(slot);
        }
        Ok(ArgumentVector { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The argument at `index`, or `None` for an empty slot or an index out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|slot| slot.as_deref())
    }

    /// Iterates over every slot, empty ones included.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.slots.iter().map(|slot| slot.as_deref())
    }
}
