//! The world's particle systems, kept as an intrusive doubly-linked list over
//! a generational arena.
//!
//! New systems are linked in at the head, so traversal visits the most
//! recently attached system first. Nothing depends on that order; each live
//! system is simply visited exactly once.

use crate::{
    core::particle::{ParticleSystem, ParticleSystemDef, ParticleSystemHandle},
    utils::allocator::Arena,
};

/// Broken list invariants reported by [`ParticleSystemRegistry::validate_links`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("head {0} has a previous link")]
    HeadHasPrev(ParticleSystemHandle),
    #[error("link to dead system {0}")]
    Dangling(ParticleSystemHandle),
    #[error("{from}.next = {to} but {to}.prev does not point back")]
    Asymmetric {
        from: ParticleSystemHandle,
        to: ParticleSystemHandle,
    },
    #[error("traversal visited {visited} systems, arena holds {live}")]
    CountMismatch { visited: usize, live: usize },
}

#[derive(Default)]
pub struct ParticleSystemRegistry {
    systems: Arena<ParticleSystem>,
    head: Option<ParticleSystemHandle>,
}

impl ParticleSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a system and links it in as the new head.
    pub(crate) fn attach(&mut self, def: ParticleSystemDef) -> ParticleSystemHandle {
        let old_head = self.head;
        let handle = self.systems.insert_with(|handle| {
            let mut system = ParticleSystem::new(handle, def);
            system.links.prev = None;
            system.links.next = old_head;
            system
        });
        if let Some(old) = old_head {
            if let Some(system) = self.systems.get_mut(old) {
                system.links.prev = Some(handle);
            }
        }
        self.head = Some(handle);
        handle
    }

    /// Unlinks a system from wherever it sits and releases it.
    pub(crate) fn detach(&mut self, handle: ParticleSystemHandle) -> Option<ParticleSystem> {
        let links = self.systems.get(handle)?.links;

        if let Some(prev) = links.prev {
            if let Some(system) = self.systems.get_mut(prev) {
                system.links.next = links.next;
            }
        }
        if let Some(next) = links.next {
            if let Some(system) = self.systems.get_mut(next) {
                system.links.prev = links.prev;
            }
        }
        if self.head == Some(handle) {
            self.head = links.next;
        }

        let mut system = self.systems.remove(handle)?;
        system.links = Default::default();
        Some(system)
    }

    pub fn head(&self) -> Option<ParticleSystemHandle> {
        self.head
    }

    pub fn next(&self, handle: ParticleSystemHandle) -> Option<ParticleSystemHandle> {
        self.systems.get(handle)?.links.next
    }

    pub fn prev(&self, handle: ParticleSystemHandle) -> Option<ParticleSystemHandle> {
        self.systems.get(handle)?.links.prev
    }

    pub fn get(&self, handle: ParticleSystemHandle) -> Option<&ParticleSystem> {
        self.systems.get(handle)
    }

    pub fn get_mut(&mut self, handle: ParticleSystemHandle) -> Option<&mut ParticleSystem> {
        self.systems.get_mut(handle)
    }

    pub fn contains(&self, handle: ParticleSystemHandle) -> bool {
        self.systems.contains(handle)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Walks the list from the head.
    pub fn iter(&self) -> RegistryIter<'_> {
        RegistryIter {
            systems: &self.systems,
            cursor: self.head,
        }
    }

    pub fn handles(&self) -> impl Iterator<Item = ParticleSystemHandle> + '_ {
        self.iter().map(ParticleSystem::handle)
    }

    /// Smallest particle radius over every registered system.
    pub fn min_radius(&self) -> Option<f32> {
        self.iter().map(ParticleSystem::radius).reduce(f32::min)
    }

    pub fn particle_count(&self) -> usize {
        self.iter().map(ParticleSystem::particle_count).sum()
    }

    /// Checks link symmetry, acyclicity and that traversal reaches every live
    /// system exactly once. Returns the number of systems visited.
    pub fn validate_links(&self) -> Result<usize, LinkError> {
        if let Some(head) = self.head {
            let system = self.systems.get(head).ok_or(LinkError::Dangling(head))?;
            if system.links.prev.is_some() {
                return Err(LinkError::HeadHasPrev(head));
            }
        }

        let live = self.systems.len();
        let mut visited = 0;
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            visited += 1;
            // A cycle would revisit nodes forever; more steps than nodes proves one.
            if visited > live {
                return Err(LinkError::CountMismatch { visited, live });
            }
            let system = self.systems.get(handle).ok_or(LinkError::Dangling(handle))?;
            if let Some(next) = system.links.next {
                let next_system = self.systems.get(next).ok_or(LinkError::Dangling(next))?;
                if next_system.links.prev != Some(handle) {
                    return Err(LinkError::Asymmetric {
                        from: handle,
                        to: next,
                    });
                }
            }
            cursor = system.links.next;
        }

        if visited != live {
            return Err(LinkError::CountMismatch { visited, live });
        }
        Ok(visited)
    }
}

/// Iterator over registered systems in list order.
pub struct RegistryIter<'a> {
    systems: &'a Arena<ParticleSystem>,
    cursor: Option<ParticleSystemHandle>,
}

impl<'a> Iterator for RegistryIter<'a> {
    type Item = &'a ParticleSystem;

    fn next(&mut self) -> Option<Self::Item> {
        let system = self.systems.get(self.cursor?)?;
        self.cursor = system.links.next;
        Some(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(radius: f32) -> ParticleSystemDef {
        ParticleSystemDef::with_radius(radius)
    }

    fn order(registry: &ParticleSystemRegistry) -> Vec<ParticleSystemHandle> {
        registry.handles().collect()
    }

    #[test]
    fn attach_links_at_head() {
        let mut registry = ParticleSystemRegistry::new();
        let a = registry.attach(def(0.1));
        let b = registry.attach(def(0.2));
        let c = registry.attach(def(0.3));

        assert_eq!(registry.head(), Some(c));
        assert_eq!(order(&registry), vec![c, b, a]);
        assert_eq!(registry.prev(c), None);
        assert_eq!(registry.prev(b), Some(c));
        assert_eq!(registry.next(a), None);
        assert_eq!(registry.validate_links(), Ok(3));
    }

    #[test]
    fn detach_splices_middle_head_and_tail() {
        let mut registry = ParticleSystemRegistry::new();
        let a = registry.attach(def(0.1));
        let b = registry.attach(def(0.1));
        let c = registry.attach(def(0.1));
        let d = registry.attach(def(0.1));

        registry.detach(b).expect("middle");
        assert_eq!(order(&registry), vec![d, c, a]);
        registry.detach(d).expect("head");
        assert_eq!(registry.head(), Some(c));
        registry.detach(a).expect("tail");
        assert_eq!(order(&registry), vec![c]);
        assert_eq!(registry.validate_links(), Ok(1));

        registry.detach(c).expect("last");
        assert_eq!(registry.head(), None);
        assert!(registry.is_empty());
        assert_eq!(registry.validate_links(), Ok(0));
    }

    #[test]
    fn stale_handle_detach_is_ignored() {
        let mut registry = ParticleSystemRegistry::new();
        let a = registry.attach(def(0.1));
        registry.detach(a);
        let b = registry.attach(def(0.1));
        assert!(registry.detach(a).is_none());
        assert_eq!(order(&registry), vec![b]);
    }

    #[test]
    fn random_attach_detach_keeps_links_consistent() {
        let mut registry = ParticleSystemRegistry::new();
        let mut live: Vec<ParticleSystemHandle> = Vec::new();
        // Small deterministic LCG so the sequence is reproducible.
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            if live.is_empty() || seed % 3 != 0 {
                live.push(registry.attach(def(0.1)));
            } else {
                let victim = live.swap_remove((seed as usize / 3) % live.len());
                assert!(registry.detach(victim).is_some());
            }
            assert_eq!(registry.validate_links(), Ok(live.len()));
        }

        let mut seen = order(&registry);
        seen.sort();
        live.sort();
        assert_eq!(seen, live);
    }

    #[test]
    fn min_radius_scans_every_system() {
        let mut registry = ParticleSystemRegistry::new();
        assert_eq!(registry.min_radius(), None);
        registry.attach(def(0.3));
        registry.attach(def(0.05));
        registry.attach(def(0.2));
        assert_eq!(registry.min_radius(), Some(0.05));
    }
}
