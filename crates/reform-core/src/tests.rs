#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::*;

    fn required() -> Validator {
        Validator::rule("required", |v| !v.is_empty_value())
    }

    fn min_length(n: usize) -> Validator {
        Validator::new(move |v| {
            let len = v.as_str().map_or(0, |s| s.chars().count());
            (len < n).then(|| {
                ValidationErrors::from([(
                    "minlength".to_string(),
                    FormValue::map([
                        ("requiredLength", FormValue::from(n as i64)),
                        ("actualLength", FormValue::from(len as i64)),
                    ]),
                )])
            })
        })
    }

    fn person() -> Schema {
        Schema::group([
            ("firstName", Schema::field_with("A", [required()])),
            ("lastName", "B".into()),
        ])
    }

    fn recorder() -> (Rc<RefCell<Vec<Option<FormValue>>>>, impl Fn(Option<StateNode>) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |form: Option<StateNode>| seen.borrow_mut().push(form.map(|f| f.value()))
        };
        (seen, sink)
    }

    // --- signals & scopes ---

    #[test]
    fn test_signal_basic() {
        let sig = signal(42);
        assert_eq!(sig.get(), 42);

        sig.set(100);
        assert_eq!(sig.get(), 100);

        sig.update(|v| *v += 1);
        assert_eq!(sig.get(), 101);
    }

    #[test]
    fn test_signal_unsubscribe_stops_delivery() {
        let sig = signal(0);
        let calls = Rc::new(RefCell::new(0));

        let id = sig.subscribe({
            let calls = calls.clone();
            move |_| *calls.borrow_mut() += 1
        });
        sig.set(1);
        assert!(sig.unsubscribe(id));
        assert!(!sig.unsubscribe(id));
        sig.set(2);

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(sig.subscriber_count(), 0);
    }

    #[test]
    fn test_signal_subscriber_may_write_back() {
        let sig = signal(0);
        sig.subscribe({
            let sig = sig.clone();
            move |v| {
                if *v < 3 {
                    sig.set(v + 1);
                }
            }
        });
        sig.set(1);
        assert_eq!(sig.get(), 3);
    }

    #[test]
    fn test_scope_explicit_dispose() {
        let cleaned_up = Rc::new(RefCell::new(Vec::new()));

        let scope = Scope::new();
        let child = scope.child();
        child.add_disposer({
            let c = cleaned_up.clone();
            move || c.borrow_mut().push("child")
        });
        scope.add_disposer({
            let c = cleaned_up.clone();
            move || c.borrow_mut().push("parent")
        });

        assert!(cleaned_up.borrow().is_empty());
        scope.dispose();
        assert_eq!(*cleaned_up.borrow(), vec!["child", "parent"]);
    }

    #[test]
    fn test_subscription_scoped_detaches_with_scope() {
        let sig = signal(0);
        let scope = Scope::new();
        scope.run(|| {
            Subscription::new({
                let sig = sig.clone();
                let id = sig.subscribe(|_| {});
                move || {
                    sig.unsubscribe(id);
                }
            })
            .scoped();
        });
        assert!(current_scope().is_none());
        assert_eq!(sig.subscriber_count(), 1);
        scope.dispose();
        assert_eq!(sig.subscriber_count(), 0);
    }

    // --- builder ---

    #[test]
    fn test_group_scenario_value_and_errors() {
        let form = build(&Schema::group([("firstName", "A".into()), ("lastName", "B".into())]));
        assert_eq!(
            form.value(),
            FormValue::map([("firstName", "A".into()), ("lastName", "B".into())])
        );
        assert_eq!(form.errors(), None);
        assert_eq!(form.status(), NodeStatus::Valid);
        assert!(!form.touched());
        assert!(!form.dirty());
    }

    #[test]
    fn test_fresh_leaf_carries_initial_errors() {
        let form = build(&Schema::group([("name", Schema::field_with("", [required()]))]));
        let name = form.as_group().unwrap().control("name").unwrap();
        assert!(name.has_error("required"));
        assert!(!form.is_valid());
        assert!(!name.touched());
    }

    #[test]
    fn test_required_scenario_marks_group_invalid() {
        let form = build(&person());
        let group = form.as_group().unwrap();
        let first = group.control("firstName").unwrap();

        first.set_value("");
        first.mark_as_touched();

        assert_eq!(
            first.errors(),
            Some(ValidationErrors::from([("required".to_string(), FormValue::Bool(true))]))
        );
        assert!(first.touched());
        assert_eq!(group.status(), NodeStatus::Invalid);
        assert_eq!(
            form.errors(),
            Some(ValidationErrors::from([(
                "firstName".to_string(),
                FormValue::map([("required", FormValue::Bool(true))])
            )]))
        );
    }

    #[test]
    fn test_validity_flips_back_up_the_chain() {
        let form = build(&Schema::group([(
            "address",
            Schema::group([
                ("street", Schema::field_with("Main", [required()])),
                ("lines", Schema::array([Schema::field_with("x", [min_length(1)])])),
            ]),
        )]));
        let street = form.find("address.street").unwrap();
        let address = form.find("address").unwrap();

        street.patch_value("");
        assert!(!street.is_valid() && !address.is_valid() && !form.is_valid());

        street.patch_value("Elm");
        assert!(street.is_valid() && address.is_valid() && form.is_valid());

        form.find("address.lines.0").unwrap().patch_value("");
        let errs = form.find("address.lines").unwrap().errors().unwrap();
        assert!(errs["0"].get("minlength").is_some());
        assert_eq!(form.status(), NodeStatus::Invalid);
    }

    #[test]
    fn test_empty_composites_are_vacuously_valid() {
        let group = build(&Schema::group(Vec::<(String, Schema)>::new()));
        let array = build(&Schema::array([]));
        assert!(group.is_valid() && array.is_valid());
        assert_eq!(group.value(), FormValue::Map(Default::default()));
        assert_eq!(array.value(), FormValue::List(vec![]));
        assert_eq!(group.leaf_count(), 0);
    }

    #[test]
    fn test_typed_child_access() {
        let form = build(&Schema::group([
            ("age", 41.into()),
            ("tags", Schema::array(["a".into()])),
            ("address", Schema::group([("city", "Oslo".into())])),
        ]));
        let g = form.as_group().unwrap();

        assert_eq!(g.control("age").unwrap().value_as::<i64>(), Ok(41));
        assert!(g.control("tags").is_none());
        assert_eq!(g.array("tags").unwrap().len(), 1);
        assert_eq!(g.group("address").unwrap().names().collect::<Vec<_>>(), vec!["city"]);
        assert!(g.get("missing").is_none());
        assert!(g.control("age").unwrap().value_as::<String>().is_err());
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["age", "tags", "address"]);
    }

    #[test]
    fn test_build_with_initial_data_overrides_and_stays_pristine() {
        let schema = Schema::group([
            ("firstName", Schema::field_with("A", [required()])),
            ("lastName", "B".into()),
            ("phones", Schema::array(["1".into(), "2".into()])),
        ]);
        let data = FormValue::map([
            ("firstName", "".into()),
            ("phones", FormValue::list(["9".into()])),
            ("unknown", true.into()),
        ]);

        let form = build_with_data(&schema, &data);
        assert_eq!(
            form.value(),
            FormValue::map([
                ("firstName", "".into()),
                ("lastName", "B".into()),
                ("phones", FormValue::list(["9".into(), "2".into()])),
            ])
        );
        assert!(!form.dirty());
        assert!(!form.is_valid());

        form.find("lastName").unwrap().patch_value("C");
        form.reset();
        assert_eq!(form.find("lastName").unwrap().value(), FormValue::from("B"));
        assert_eq!(form.find("firstName").unwrap().value(), FormValue::from(""));
    }

    #[test]
    fn test_build_json_rejects_unknown_variant() {
        let validators = ValidatorSet::new().with("required", required());
        let form = build_json(
            &json!({"type": "Group", "fields": {"firstName": {"type": "Field", "initialValue": "", "options": {"validators": ["required"]}}}}),
            &validators,
        )
        .unwrap();
        assert!(!form.is_valid());

        let err = build_json(&json!({"type": "Record", "fields": {}}), &validators).unwrap_err();
        assert_eq!(err, SchemaError::UnknownVariant { tag: "Record".into() });
    }

    #[test]
    fn test_json_group_keeps_field_order() {
        let form = build_json(
            &json!({"type": "Group", "fields": {"lastName": "B", "firstName": "A", "middle": "M"}}),
            &ValidatorSet::new(),
        )
        .unwrap();
        let group = form.as_group().unwrap();
        assert_eq!(group.names().collect::<Vec<_>>(), vec!["lastName", "firstName", "middle"]);
        assert_eq!(form.value().to_string(), r#"{"lastName":"B","firstName":"A","middle":"M"}"#);

        let data = FormValue::from(json!({"z": 1, "a": 2}));
        assert_eq!(data.as_map().unwrap().keys().map(String::as_str).collect::<Vec<_>>(), vec!["z", "a"]);
    }

    // --- node mutation & flags ---

    #[test]
    fn test_round_trip_value() {
        let form = build(&person());
        let last = form.find("lastName").unwrap();
        last.patch_value(FormValue::from("Lovelace"));
        assert_eq!(last.value(), FormValue::from("Lovelace"));
        assert!(last.dirty());
        assert!(form.dirty());
        assert!(!form.find("firstName").unwrap().dirty());
    }

    #[test]
    fn test_touched_propagates_down_not_up() {
        let form = build(&Schema::group([
            ("a", 1.into()),
            ("inner", Schema::group([("b", 2.into())])),
        ]));

        form.find("a").unwrap().mark_as_touched();
        assert!(!form.touched());

        form.mark_as_touched();
        assert!(form.touched());
        assert!(form.find("inner").unwrap().touched());
        assert!(form.find("inner.b").unwrap().touched());

        // setting a value never clears touched
        form.find("inner.b").unwrap().patch_value(3);
        assert!(form.find("inner.b").unwrap().touched());

        form.mark_as_untouched();
        assert!(!form.find("inner.b").unwrap().touched());
    }

    #[test]
    fn test_patch_is_atomic_and_notifies_once() {
        let form = build(&person());
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let _sub = form.subscribe({
            let snapshots = snapshots.clone();
            move |node| snapshots.borrow_mut().push(node.value())
        });

        form.patch_value(FormValue::map([("firstName", "X".into()), ("lastName", "Y".into())]));

        assert_eq!(
            *snapshots.borrow(),
            vec![FormValue::map([("firstName", "X".into()), ("lastName", "Y".into())])]
        );
    }

    #[test]
    fn test_leaf_subscribers_see_the_whole_patch() {
        let form = build(&person());
        let seen_last = Rc::new(RefCell::new(None));
        let _sub = form.find("firstName").unwrap().subscribe({
            let seen_last = seen_last.clone();
            let form = form.clone();
            move |_| *seen_last.borrow_mut() = Some(form.find("lastName").unwrap().value())
        });

        form.patch_value(FormValue::map([("firstName", "X".into()), ("lastName", "Y".into())]));
        assert_eq!(*seen_last.borrow(), Some(FormValue::from("Y")));
    }

    #[test]
    fn test_setting_same_value_is_silent() {
        let form = build(&person());
        let before = form.version();
        form.find("lastName").unwrap().patch_value("B");
        assert_eq!(form.version(), before);
        assert!(!form.dirty());
    }

    #[test]
    fn test_patch_ignores_shape_mismatches() {
        let form = build(&Schema::group([("items", Schema::array([1.into()]))]));
        form.patch_value(FormValue::map([
            ("items", FormValue::list([5.into(), 6.into()])),
            ("nope", 1.into()),
        ]));
        form.patch_value(FormValue::from("not a map"));
        assert_eq!(form.value(), FormValue::map([("items", FormValue::list([5.into()]))]));
        assert_eq!(form.leaf_count(), 1);
    }

    #[test]
    fn test_reset_restores_initial_and_clears_flags() {
        let form = build(&person());
        let first = form.find("firstName").unwrap();
        first.patch_value("");
        form.mark_as_touched();
        assert!(form.dirty() && form.touched() && !form.is_valid());

        form.reset();
        assert_eq!(first.value(), FormValue::from("A"));
        assert!(!form.dirty() && !form.touched() && !first.touched());
        assert!(form.is_valid());
    }

    #[test]
    fn test_dirty_and_pristine() {
        let form = build(&person());
        let last = form.find("lastName").unwrap();
        form.mark_as_dirty();
        assert!(form.dirty());
        assert!(!last.dirty());
        assert!(form.flags().contains(NodeFlags::DIRTY));

        last.patch_value("Z");
        form.mark_as_pristine();
        assert!(!form.dirty() && !last.dirty());
        assert_eq!(last.value(), FormValue::from("Z"));
    }

    #[test]
    fn test_revalidate_after_external_change() {
        let limit = Rc::new(RefCell::new(10i64));
        let max = Validator::new({
            let limit = limit.clone();
            move |v| {
                (v.as_i64().unwrap_or(0) > *limit.borrow())
                    .then(|| ValidationErrors::from([("max".to_string(), FormValue::Bool(true))]))
            }
        });
        let control = FormControl::new(5, [max]);
        assert!(control.is_valid());

        *limit.borrow_mut() = 3;
        assert!(control.is_valid());
        control.revalidate();
        assert!(control.has_error("max"));
    }

    #[test]
    fn test_parent_links_and_find() {
        let form = build(&Schema::group([(
            "items",
            Schema::array([Schema::group([("name", "n0".into())])]),
        )]));
        let name = form.find("items.0.name").unwrap();
        assert!(name.root().ptr_eq(&form));
        assert!(name.parent().unwrap().ptr_eq(&form.find("items.0").unwrap()));
        assert!(form.find("items.1").is_none());
        assert!(form.find("items.x").is_none());
        assert!(form.find("items.0.name.deeper").is_none());
        assert!(form.find("").unwrap().ptr_eq(&form));
    }

    #[test]
    fn test_unsubscribed_node_is_quiet() {
        let form = build(&person());
        let calls = Rc::new(RefCell::new(0));
        let sub = form.subscribe({
            let calls = calls.clone();
            move |_| *calls.borrow_mut() += 1
        });
        form.find("lastName").unwrap().patch_value("C");
        sub.cancel();
        form.find("lastName").unwrap().patch_value("D");
        form.mark_as_touched();
        assert_eq!(*calls.borrow(), 1);
    }

    // --- registry ---

    #[test]
    fn test_register_form_always_creates() {
        let registry = FormRegistry::new();
        let root = build(&person());
        let k1 = registry.register_form(root.clone());
        let k2 = registry.register_form(root);
        assert_ne!(k1, k2);
        assert_eq!(registry.len(), 2);
        assert!(k1.as_str().starts_with("form-"));
    }

    #[test]
    fn test_create_is_idempotent_by_key() {
        let registry = FormRegistry::new();
        let k = registry.create_and_register_form(&person(), CreateOptions::new().with_key("k1"));
        assert_eq!(k, FormKey::from("k1"));
        let first = registry.get_form("k1").unwrap();

        first.patch_value(FormValue::map([("lastName", "Edited".into())]));

        let again = registry.create_and_register_form(&person(), CreateOptions::new().with_key("k1"));
        assert_eq!(again, k);
        let stored = registry.get_form(&again).unwrap();
        assert!(stored.ptr_eq(&first));
        assert_eq!(stored.find("lastName").unwrap().value(), FormValue::from("Edited"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_with_other_shape_keeps_stored_tree() {
        let registry = FormRegistry::new();
        registry.create_and_register_form(&person(), CreateOptions::new().with_key("k"));
        registry.create_and_register_form(&Schema::field(0), CreateOptions::new().with_key("k"));
        assert_eq!(registry.get_form("k").unwrap().kind(), "group");
    }

    #[test]
    fn test_create_without_key_generates_fresh_ones() {
        let registry = FormRegistry::with_config(RegistryConfig {
            key_prefix: "draft".into(),
        });
        let a = registry.create_and_register_form(&person(), CreateOptions::new());
        let b = registry.create_and_register_form(&person(), CreateOptions::new());
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("draft-"));
        assert!(!registry.get_form(&a).unwrap().ptr_eq(&registry.get_form(&b).unwrap()));
    }

    #[test]
    fn test_create_with_initial_data() {
        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(
            &person(),
            CreateOptions::new().with_initial_data(FormValue::map([("lastName", "Hopper".into())])),
        );
        assert_eq!(
            registry.get_form(&key).unwrap().value(),
            FormValue::map([("firstName", "A".into()), ("lastName", "Hopper".into())])
        );
    }

    #[test]
    fn test_generated_keys_skip_caller_claimed_ones() {
        let registry = FormRegistry::with_config(RegistryConfig {
            key_prefix: "clash".into(),
        });
        let probe = registry.register_form(build(&Schema::field(0)));
        let n: u64 = probe.as_str().trim_start_matches("clash-").parse().unwrap();
        for i in 1..=8 {
            registry.create_and_register_form(
                &Schema::field(1),
                CreateOptions::new().with_key(format!("clash-{}", n + i)),
            );
        }
        let fresh = registry.register_form(build(&Schema::field(2)));
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.get_form(&fresh).unwrap().value(), FormValue::Int(2));
    }

    #[test]
    fn test_first_claim_wins_when_reentered_during_build() {
        let registry = FormRegistry::new();
        let reentered = Rc::new(RefCell::new(false));
        let sneaky = Validator::new({
            let registry = registry.clone();
            let reentered = reentered.clone();
            move |_| {
                if !*reentered.borrow() {
                    *reentered.borrow_mut() = true;
                    registry.create_and_register_form(&Schema::field("first"), CreateOptions::new().with_key("k"));
                }
                None
            }
        });

        let key = registry.create_and_register_form(
            &Schema::field_with("second", [sneaky]),
            CreateOptions::new().with_key("k"),
        );
        assert_eq!(key, FormKey::from("k"));
        assert_eq!(registry.get_form("k").unwrap().value(), FormValue::from("first"));
    }

    #[test]
    fn test_form_key_borrows_as_str() {
        let mut labels: std::collections::HashMap<FormKey, &str> = std::collections::HashMap::new();
        labels.insert(FormKey::from("k1"), "first");
        assert_eq!(labels.get("k1"), Some(&"first"));

        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(&person(), CreateOptions::new().with_key("k1"));
        assert!(registry.contains(key.as_str()));
        assert_eq!(registry.keys(), vec![key]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(&person(), CreateOptions::new().with_key("k"));
        assert!(registry.remove_form(&key).is_some());
        assert!(registry.remove_form(&key).is_none());
        assert!(registry.get_form(&key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_change_counter() {
        let registry = FormRegistry::new();
        let changes = registry.changes();
        registry.create_and_register_form(&person(), CreateOptions::new().with_key("a"));
        registry.create_and_register_form(&person(), CreateOptions::new().with_key("a"));
        registry.register_form(build(&person()));
        registry.remove_form("missing");
        assert_eq!(changes.get(), 2);
        registry.clear();
        assert_eq!(changes.get(), 3);
        assert!(registry.keys().is_empty());
    }

    // --- bridge ---

    #[test]
    fn test_watch_emits_current_handle_immediately() {
        let registry = FormRegistry::new();
        registry.create_and_register_form(&person(), CreateOptions::new().with_key("k1"));
        let (seen, sink) = recorder();

        let watch = registry.watch("k1", sink);
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].is_some());
        assert_eq!(
            watch.state(),
            BridgeState::Resolved {
                key: Some("k1".into()),
                found: true
            }
        );
    }

    #[test]
    fn test_watch_reemits_on_internal_change() {
        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(&person(), CreateOptions::new());
        let (seen, sink) = recorder();
        let watch = registry.watch(&key, sink);

        let form = watch.current().unwrap();
        form.find("lastName").unwrap().patch_value("C");
        form.mark_as_touched();

        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(
            seen.borrow()[1],
            Some(FormValue::map([("firstName", "A".into()), ("lastName", "C".into())]))
        );
    }

    #[test]
    fn test_watch_switch_suppresses_stale_changes() {
        let registry = FormRegistry::new();
        let k1 = registry.create_and_register_form(&Schema::field(1), CreateOptions::new());
        let k2 = registry.create_and_register_form(&Schema::field(2), CreateOptions::new());
        let keys = signal(Some(k1.clone()));
        let (seen, sink) = recorder();
        let _watch = registry.watch(&keys, sink);

        let old = registry.get_form(&k1).unwrap();
        keys.set(Some(k2.clone()));
        old.patch_value(100);
        registry.get_form(&k2).unwrap().patch_value(200);

        assert_eq!(
            *seen.borrow(),
            vec![Some(FormValue::Int(1)), Some(FormValue::Int(2)), Some(FormValue::Int(200))]
        );
    }

    #[test]
    fn test_watch_missing_key_yields_absent() {
        let registry = FormRegistry::new();
        let keys = signal(Some(FormKey::from("nope")));
        let (seen, sink) = recorder();
        let watch = registry.watch(&keys, sink);

        assert_eq!(*seen.borrow(), vec![None::<FormValue>]);
        assert_eq!(
            watch.state(),
            BridgeState::Resolved {
                key: Some("nope".into()),
                found: false
            }
        );

        // a late registration under the watched key is picked up
        registry.create_and_register_form(&Schema::field(7), CreateOptions::new().with_key("nope"));
        assert_eq!(*seen.borrow(), vec![None, Some(FormValue::Int(7))]);

        keys.set(Some("nope".into()));
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_removed_key_resolves_absent_afterwards() {
        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(&person(), CreateOptions::new().with_key("k"));
        let keys = signal(Some(key.clone()));
        let (seen, sink) = recorder();
        let _watch = registry.watch(&keys, sink);

        registry.remove_form(&key);
        assert!(registry.get_form(&key).is_none());
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow().last().cloned(), Some(None::<FormValue>));

        keys.set(Some(key.clone()));
        assert_eq!(seen.borrow().last().cloned(), Some(None::<FormValue>));

        let (late, late_sink) = recorder();
        let _late = registry.watch(&key, late_sink);
        assert_eq!(*late.borrow(), vec![None::<FormValue>]);
    }

    #[test]
    fn test_fixed_key_watch_follows_remove_and_recreate() {
        let registry = FormRegistry::new();
        registry.create_and_register_form(&Schema::field(1), CreateOptions::new().with_key("k"));
        let (seen, sink) = recorder();
        let watch = registry.watch("k", sink);
        let evicted = watch.current().unwrap();

        registry.remove_form("k");
        assert!(watch.current().is_none());
        assert_eq!(
            watch.state(),
            BridgeState::Resolved {
                key: Some("k".into()),
                found: false
            }
        );

        registry.create_and_register_form(&Schema::field(2), CreateOptions::new().with_key("k"));
        evicted.patch_value(99);
        registry.get_form("k").unwrap().patch_value(3);

        assert_eq!(
            *seen.borrow(),
            vec![
                Some(FormValue::Int(1)),
                None,
                Some(FormValue::Int(2)),
                Some(FormValue::Int(3)),
            ]
        );
        assert!(watch.current().unwrap().ptr_eq(&registry.get_form("k").unwrap()));
    }

    #[test]
    fn test_unrelated_registry_changes_do_not_reemit() {
        let registry = FormRegistry::new();
        registry.create_and_register_form(&person(), CreateOptions::new().with_key("k"));
        let (seen, sink) = recorder();
        let _watch = registry.watch("k", sink);

        let other = registry.register_form(build(&person()));
        registry.remove_form(&other);
        registry.create_and_register_form(&Schema::field(0), CreateOptions::new().with_key("k"));

        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_unsubscribe_detaches_without_touching_registry() {
        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(&person(), CreateOptions::new());
        let keys = signal(Some(key.clone()));
        let (seen, sink) = recorder();
        let watch = registry.watch(&keys, sink);
        let form = watch.current().unwrap();

        watch.unsubscribe();
        form.mark_as_touched();
        keys.set(None);

        assert_eq!(seen.borrow().len(), 1);
        assert!(registry.contains(&key));
        registry.remove_form(&key);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(keys.subscriber_count(), 0);
        assert_eq!(registry.changes().subscriber_count(), 0);
    }

    #[test]
    fn test_watch_key_change_from_inside_sink() {
        let registry = FormRegistry::new();
        let a = registry.create_and_register_form(&Schema::field("a"), CreateOptions::new());
        let b = registry.create_and_register_form(&Schema::field("b"), CreateOptions::new());
        let keys = signal(Some(a.clone()));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let watch = registry.watch(&keys, {
            let keys = keys.clone();
            let seen = seen.clone();
            let b = b.clone();
            move |form: Option<StateNode>| {
                let value = form.map(|f| f.value());
                seen.borrow_mut().push(value.clone());
                // redirect once `a` is touched
                if value == Some(FormValue::from("a!")) {
                    keys.set(Some(b.clone()));
                }
            }
        });

        registry.get_form(&a).unwrap().patch_value("a!");
        assert_eq!(
            *seen.borrow(),
            vec![Some(FormValue::from("a")), Some(FormValue::from("a!")), Some(FormValue::from("b"))]
        );
        assert_eq!(
            watch.state(),
            BridgeState::Resolved {
                key: Some(b),
                found: true
            }
        );
    }

    #[test]
    fn test_watch_attached_to_scope() {
        let registry = FormRegistry::new();
        let key = registry.create_and_register_form(&person(), CreateOptions::new());
        let (seen, sink) = recorder();
        let scope = Scope::new();
        registry.watch(&key, sink).attach_to(&scope);

        let form = registry.get_form(&key).unwrap();
        form.mark_as_touched();
        scope.dispose();
        form.mark_as_untouched();
        assert_eq!(seen.borrow().len(), 2);
    }

    // --- properties ---

    fn arb_schema() -> impl Strategy<Value = Schema> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(|n| Schema::field(n)),
            "[a-z]{0,4}".prop_map(|s| Schema::field_with(s, [required()])),
            any::<bool>().prop_map(|b| Schema::field(b)),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(|items| Schema::array(items)),
                prop::collection::vec(("[a-z]{1,3}", inner), 0..4).prop_map(|fields| Schema::group(fields)),
            ]
        })
    }

    fn shape(node: &StateNode) -> String {
        match node {
            StateNode::Control(_) => "c".into(),
            StateNode::Group(g) => format!(
                "g({})",
                g.children()
                    .map(|(k, c)| format!("{k}:{}", shape(c)))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            StateNode::Array(a) => format!("a({})", a.iter().map(shape).collect::<Vec<_>>().join(",")),
        }
    }

    fn leaves(node: &StateNode, out: &mut Vec<FormControl>) {
        match node {
            StateNode::Control(c) => out.push(c.clone()),
            StateNode::Group(g) => g.children().for_each(|(_, c)| leaves(c, out)),
            StateNode::Array(a) => a.iter().for_each(|c| leaves(c, out)),
        }
    }

    proptest! {
        #[test]
        fn build_is_deterministic(schema in arb_schema()) {
            let a = build(&schema);
            let b = build(&schema);
            prop_assert_eq!(shape(&a), shape(&b));
            prop_assert_eq!(a.value(), b.value());
            prop_assert_eq!(a.errors(), b.errors());
            prop_assert_eq!(a.value(), schema.initial_value());
        }

        #[test]
        fn composite_valid_iff_every_leaf_valid(schema in arb_schema(), blank in any::<prop::sample::Index>()) {
            let root = build(&schema);
            let mut all = Vec::new();
            leaves(&root, &mut all);
            if !all.is_empty() {
                let target = blank.get(&all);
                target.set_value("");
            }
            prop_assert_eq!(root.is_valid(), all.iter().all(FormControl::is_valid));
            prop_assert_eq!(root.errors().is_none(), root.is_valid());
        }
    }
}
