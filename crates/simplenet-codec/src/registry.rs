//! The per-channel descriptor registry.
//!
//! One descriptor needs two independent lookups: by Rust type when
//! encoding (the caller has a value and wants its discriminator), and by
//! discriminator when dispatching (the wire has a byte and we want the
//! decoder). The registry keeps two maps pointing at the same
//! `Arc`-shared descriptor.
//!
//! # Concurrency
//!
//! Both maps live behind a single `parking_lot::RwLock`. Registration takes
//! the write lock for the whole check-then-insert, so two racing
//! registrations for the same slot serialize: one wins, the other gets a
//! `Duplicate*` error. Lookups take the read lock just long enough to clone
//! an `Arc`; encoding and decoding run with no lock held.
//!
//! # Freezing
//!
//! ```text
//! Open ──(freeze)──→ Frozen
//! ```
//!
//! Once frozen, every registration fails with
//! [`CodecError::RegistryFrozen`]. There is no way back.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use simplenet_protocol::{ChannelName, Discriminator};

use crate::{CodecError, MessageDescriptor, RegisteredMessage};

// ---------------------------------------------------------------------------
// RegistryState / FreezePolicy
// ---------------------------------------------------------------------------

/// Whether the registry still accepts registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Open,
    Frozen,
}

impl RegistryState {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Frozen => write!(f, "Frozen"),
        }
    }
}

/// When a registry freezes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezePolicy {
    /// Only an explicit [`Registry::freeze`] freezes the registry.
    #[default]
    Manual,
    /// The first dispatch on the channel freezes the registry, separating
    /// startup from runtime.
    OnFirstDispatch,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Tables {
    state: RegistryState,
    /// Typed view, downcast back to `MessageDescriptor<M>` on lookup.
    by_kind: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Erased view for the decode path.
    by_discriminator: HashMap<Discriminator, Arc<dyn RegisteredMessage>>,
}

/// All message descriptors registered on one channel.
pub struct Registry {
    channel: ChannelName,
    tables: RwLock<Tables>,
}

impl Registry {
    /// Creates an empty, open registry for `channel`.
    pub fn new(channel: ChannelName) -> Self {
        Self {
            channel,
            tables: RwLock::new(Tables {
                state: RegistryState::Open,
                by_kind: HashMap::new(),
                by_discriminator: HashMap::new(),
            }),
        }
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Adds a descriptor and returns the shared handle both tables point at.
    ///
    /// # Errors
    /// - [`CodecError::RegistryFrozen`]: the registry was frozen
    /// - [`CodecError::DuplicateKind`]: `M` is already registered
    /// - [`CodecError::DuplicateDiscriminator`]: another kind owns the byte
    pub fn register<M: 'static>(
        &self,
        descriptor: MessageDescriptor<M>,
    ) -> Result<Arc<MessageDescriptor<M>>, CodecError> {
        let kind = type_name::<M>();
        let discriminator = descriptor.discriminator();
        let mut tables = self.tables.write();

        if !tables.state.is_open() {
            tracing::error!(channel = %self.channel, kind, "registration after freeze");
            return Err(CodecError::RegistryFrozen {
                channel: self.channel.clone(),
                kind,
            });
        }
        if tables.by_kind.contains_key(&TypeId::of::<M>()) {
            tracing::error!(channel = %self.channel, kind, "duplicate message kind");
            return Err(CodecError::DuplicateKind {
                channel: self.channel.clone(),
                kind,
            });
        }
        if let Some(existing) = tables.by_discriminator.get(&discriminator) {
            let existing = existing.kind_name();
            tracing::error!(
                channel = %self.channel,
                kind,
                existing,
                %discriminator,
                "duplicate discriminator"
            );
            return Err(CodecError::DuplicateDiscriminator {
                channel: self.channel.clone(),
                discriminator,
                existing,
                kind,
            });
        }

        let descriptor = Arc::new(descriptor);
        let typed: Arc<dyn Any + Send + Sync> = descriptor.clone();
        let erased: Arc<dyn RegisteredMessage> = descriptor.clone();
        tables.by_kind.insert(TypeId::of::<M>(), typed);
        tables.by_discriminator.insert(discriminator, erased);

        tracing::debug!(channel = %self.channel, kind, %discriminator, "registered message kind");
        Ok(descriptor)
    }

    /// Looks up the descriptor for `M`, for the encode path.
    pub fn find_by_kind<M: 'static>(&self) -> Option<Arc<MessageDescriptor<M>>> {
        let typed = self.tables.read().by_kind.get(&TypeId::of::<M>())?.clone();
        typed.downcast::<MessageDescriptor<M>>().ok()
    }

    /// Looks up the descriptor owning `discriminator`, for the decode path.
    pub fn find_by_discriminator(
        &self,
        discriminator: Discriminator,
    ) -> Option<Arc<dyn RegisteredMessage>> {
        self.tables.read().by_discriminator.get(&discriminator).cloned()
    }

    /// Stops accepting registrations. Freezing twice is a no-op.
    pub fn freeze(&self) {
        let mut tables = self.tables.write();
        if tables.state.is_open() {
            tables.state = RegistryState::Frozen;
            tracing::debug!(
                channel = %self.channel,
                kinds = tables.by_kind.len(),
                "registry frozen"
            );
        }
    }

    pub fn state(&self) -> RegistryState {
        self.tables.read().state
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_discriminator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered descriptor, ordered by discriminator.
    pub fn descriptors(&self) -> Vec<Arc<dyn RegisteredMessage>> {
        let mut all: Vec<_> = self.tables.read().by_discriminator.values().cloned().collect();
        all.sort_by_key(|d| d.discriminator());
        all
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("Registry")
            .field("channel", &self.channel)
            .field("state", &tables.state)
            .field("kinds", &tables.by_kind.len())
            .finish()
    }
}
