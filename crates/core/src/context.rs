// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use revtrail_domain::AuditConfiguration;

use crate::notifier::EntityChangeNotifier;
use crate::revision::{DefaultRevisionInfoGenerator, RevisionInfoGenerator};
use crate::strategy::AuditStrategy;

/// Settings and collaborators shared by every audit process.
#[derive(Debug, Clone)]
pub struct AuditContext {
    config: AuditConfiguration,
    strategy: AuditStrategy,
    generator: Arc<dyn RevisionInfoGenerator>,
    notifier: EntityChangeNotifier,
}

impl AuditContext {
    /// Creates a context using `generator` for revisions.
    #[must_use]
    pub fn new(config: AuditConfiguration, generator: Arc<dyn RevisionInfoGenerator>) -> Self {
        Self {
            strategy: AuditStrategy::from_kind(config.strategy),
            notifier: EntityChangeNotifier::new(Arc::clone(&generator)),
            config,
            generator,
        }
    }

    /// Creates a context with the default revision generator.
    #[must_use]
    pub fn with_default_generator(config: AuditConfiguration) -> Self {
        let generator: DefaultRevisionInfoGenerator =
            DefaultRevisionInfoGenerator::new(config.track_entities_changed_in_revision);
        Self::new(config, Arc::new(generator))
    }

    /// The audit configuration.
    #[must_use]
    pub const fn config(&self) -> &AuditConfiguration {
        &self.config
    }

    /// The row-writing strategy.
    #[must_use]
    pub const fn strategy(&self) -> AuditStrategy {
        self.strategy
    }

    /// The revision generator.
    #[must_use]
    pub fn generator(&self) -> &dyn RevisionInfoGenerator {
        self.generator.as_ref()
    }

    /// The change notifier.
    #[must_use]
    pub const fn notifier(&self) -> &EntityChangeNotifier {
        &self.notifier
    }
}
