//! Defines the three-way comparison that turns the last-seen source, the new
//! source and the current target into a [`Classification`].
//!
//! The comparison runs in three steps that each depend on the one before:
//! node creation and destruction decide which nodes exist afterwards,
//! reparenting needs that final node set, and component diffing needs to know
//! which nodes are being moved.

use std::collections::BTreeSet;

use super::{Classification, ComponentRules, ComponentWrite, FlatIndex, NameAliasTable};

pub fn classify(
    old: &FlatIndex,
    new: &FlatIndex,
    target: &FlatIndex,
    aliases: &NameAliasTable,
    rules: &ComponentRules,
) -> Classification {
    let context = ClassifyContext {
        old,
        new,
        target,
        aliases,
        rules,
    };

    let mut classification = Classification::new();

    context.classify_nodes(&mut classification);
    let updated_target = context.nodes_in_updated_target(&classification);

    context.classify_reparenting(&mut classification);
    context.classify_components(&mut classification, &updated_target);

    log::trace!("Classified {} edits", classification.edit_count());

    classification
}

struct ClassifyContext<'a> {
    old: &'a FlatIndex,
    new: &'a FlatIndex,
    target: &'a FlatIndex,
    aliases: &'a NameAliasTable,
    rules: &'a ComponentRules,
}

impl<'a> ClassifyContext<'a> {
    /// Translates a source name into the target's naming. An alias pointing
    /// at a node that neither the old source nor the target has is ignored.
    fn target_name<'b>(&'b self, source_name: &'b str) -> &'b str {
        let target_name = self.aliases.target_name_for(source_name);

        if self.old.contains(target_name) || self.target.contains(target_name) {
            target_name
        } else {
            source_name
        }
    }

    /// Translates a target name into the source's naming. An alias pointing
    /// at a node that neither source snapshot has is ignored.
    fn source_name<'b>(&'b self, target_name: &'b str) -> &'b str {
        let source_name = self.aliases.source_name_for(target_name);

        if self.old.contains(source_name) || self.new.contains(source_name) {
            source_name
        } else {
            target_name
        }
    }

    /// The name a node from the new source will carry in the target once the
    /// classification has been applied.
    fn post_edit_name(&self, source_name: &str, out: &Classification) -> String {
        if out.nodes_to_rename.contains(source_name) || out.nodes_to_create.contains(source_name)
        {
            source_name.to_owned()
        } else {
            self.target_name(source_name).to_owned()
        }
    }

    fn classify_nodes(&self, out: &mut Classification) {
        let mut renamed_from = BTreeSet::new();

        // Renames have to be found first, otherwise they look like a node
        // being destroyed and an unrelated one being created.
        for name in self.new.node_names() {
            if self.old.contains(name) {
                continue;
            }

            let target_name = self.target_name(name);

            if self.old.contains(target_name) {
                log::debug!("'{}' was renamed to '{}'", target_name, name);
                renamed_from.insert(target_name);
                out.nodes_to_rename.insert(name.to_owned());
            } else if !self.target.contains(target_name) {
                log::debug!("'{}' is new", name);
                out.nodes_to_create.insert(name.to_owned());
            }
        }

        for name in self.old.node_names() {
            if self.new.contains(name) || renamed_from.contains(name) {
                continue;
            }

            let target_name = self.target_name(name);

            if self.target.contains(target_name) {
                log::debug!("'{}' was removed", target_name);
                out.nodes_to_destroy.insert(target_name.to_owned());
            }
        }
    }

    fn nodes_in_updated_target(&self, out: &Classification) -> BTreeSet<String> {
        let mut nodes: BTreeSet<String> = self
            .target
            .node_names()
            .filter(|name| !out.nodes_to_destroy.contains(*name))
            .map(str::to_owned)
            .collect();

        nodes.extend(out.nodes_to_create.iter().cloned());
        nodes.insert(String::new());

        nodes
    }

    /// The new source's parent always wins, even over a parent the user
    /// changed locally. Those overrides are logged, not reported as errors.
    ///
    /// Only nodes the source moved are reparented. A node the user moved
    /// locally keeps its local parent when the source left it alone, even if
    /// that no longer fits with the source's other moves. If the user put B
    /// under A and the source put A under B, the only reparenting is A under
    /// B, which is now A's own child. The mutator then fails with a cycle
    /// error and the pass aborts without touching the target.
    fn classify_reparenting(&self, out: &mut Classification) {
        let mut reparentings = Vec::new();

        for name in self.target.node_names() {
            if out.nodes_to_destroy.contains(name) {
                continue;
            }

            let source_name = self.source_name(name);
            if !self.new.contains(source_name) {
                continue;
            }

            let old_name = if self.old.contains(name) {
                name
            } else {
                source_name
            };

            let target_parent = self.target.parent_of(name);
            let old_parent = self.old.parent_of(old_name);
            let new_parent = self.new.parent_of(source_name);

            let moved_in_source = self.source_name(old_parent) != new_parent;
            let already_in_place =
                target_parent == new_parent || self.source_name(target_parent) == new_parent;

            if !moved_in_source || already_in_place {
                continue;
            }

            if self.old.contains(old_name) && target_parent != old_parent {
                log::warn!(
                    "'{}' was moved locally from '{}' to '{}', but the source now puts it under '{}'; \
                     keeping the source's parent",
                    name,
                    old_parent,
                    target_parent,
                    new_parent
                );
            }

            reparentings.push((
                self.post_edit_name(source_name, out),
                self.post_edit_name(new_parent, out),
            ));
        }

        for name in &out.nodes_to_create {
            reparentings.push((name.clone(), self.post_edit_name(self.new.parent_of(name), out)));
        }

        for (child, parent) in reparentings {
            log::debug!("'{}' moves under '{}'", child, parent);
            out.reparentings.insert(child, parent);
        }
    }

    fn classify_components(&self, out: &mut Classification, updated_target: &BTreeSet<String>) {
        for name in updated_target {
            let is_created = out.nodes_to_create.contains(name);

            let source_name = if is_created {
                name.as_str()
            } else {
                self.source_name(name)
            };

            // Nodes the new source doesn't have are either being destroyed or
            // were never tracked; their components aren't ours to touch.
            if !self.new.contains(source_name) {
                continue;
            }

            let key = self.post_edit_name(source_name, out);
            let old_name = if self.old.contains(source_name) {
                source_name
            } else {
                name.as_str()
            };
            let reparented = out.reparentings.contains_key(&key);

            let mut types: BTreeSet<&str> = self.old.component_types_of(old_name).into_iter().collect();
            types.extend(self.new.component_types_of(source_name));

            for type_name in types {
                let old_values = self.old.component_values_of(old_name, type_name);
                let new_values = self.new.component_values_of(source_name, type_name);
                let target_values: &[String] = if is_created {
                    &[]
                } else {
                    self.target.component_values_of(name, type_name)
                };

                // Moving a node changes what its transform has to encode, even
                // when the payload text is the same.
                let force = reparented && self.rules.is_transform(type_name);

                for (index, payload) in new_values.iter().enumerate() {
                    let changed_in_source = old_values.get(index) != Some(payload);
                    let matches_target = target_values.get(index) == Some(payload);

                    if force || (changed_in_source && !matches_target) {
                        out.components_to_update.push(
                            key.clone(),
                            type_name.to_owned(),
                            ComponentWrite {
                                index,
                                payload: payload.clone(),
                            },
                        );
                    }
                }

                for (index, old_payload) in old_values.iter().enumerate().skip(new_values.len()) {
                    if target_values.get(index) == Some(old_payload) {
                        out.components_to_destroy
                            .push(key.clone(), type_name.to_owned(), index);
                    } else {
                        log::debug!(
                            "Keeping locally edited {} #{} on '{}'",
                            type_name,
                            index,
                            key
                        );
                    }
                }
            }
        }
    }
}
