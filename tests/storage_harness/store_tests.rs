//! Macro-generated test suite for `Store<TestUser>` contract validation.
//!
//! The `store_contract_tests!` macro generates a test module that validates
//! any `Store<TestUser>` implementation against the full port contract:
//! identity assignment, every constraint kind, ordering and windows, and the
//! soft-delete lifecycle.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use crudkit::storage::InMemoryStore;
//!
//! store_contract_tests!(InMemoryStore::<TestUser>::new());
//! ```
//!
//! # Generated Tests
//!
//! ## Lifecycle
//! - `test_insert_assigns_identity`: distinct non-zero identities, timestamps set
//! - `test_insert_then_find_round_trip`: persisted fields survive
//! - `test_find_missing`: unknown identity is `None`
//! - `test_save_overwrites_live_row` / `test_save_skips_missing_and_tombstoned`
//! - `test_update_fields_touches_only_named_columns`
//! - `test_soft_delete_and_clear_tombstone`: visibility in every mode
//! - `test_hard_delete`
//!
//! ## Queries
//! - comparison, `in`, empty `in`, `between` (closed and half-open), `like`
//! - filter values given as strings take the column's type; values the
//!   column cannot take are query errors
//! - ordering on several keys, windows, `count` under the same constraints

/// Generate a full `Store<TestUser>` conformance test suite.
///
/// `$factory` must evaluate to a fresh, empty store; it is re-evaluated for
/// each test.
macro_rules! store_contract_tests {
    ($factory:expr) => {
        mod store_contract_tests {
            use super::*;
            use crudkit::core::compiler::{compile, CompileOptions, CompiledQuery, Visibility};
            use crudkit::core::query::FilterRequest;
            use crudkit::core::store::{Store, StoreError, Window};
            use serde_json::{json, Map};

            fn compiled(request: FilterRequest) -> CompiledQuery {
                compile(&request, &CompileOptions::default()).unwrap()
            }

            async fn ages(store: &dyn Store<TestUser>, request: FilterRequest) -> Vec<i64> {
                store
                    .query(&compiled(request), None)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|u| u.age)
                    .collect()
            }

            // ==================================================================
            // Lifecycle
            // ==================================================================

            #[tokio::test]
            async fn test_insert_assigns_identity() {
                let store = $factory;
                let a = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();
                let b = store
                    .insert(create_test_user("Bob", "bob@test.com", 25, 3.0, false))
                    .await
                    .unwrap();

                assert_ne!(a.id, 0);
                assert_ne!(b.id, 0);
                assert_ne!(a.id, b.id);
                assert!(a.created_at.is_some());
                assert!(a.updated_at.is_some());
                assert!(a.deleted_at.is_none());
            }

            #[tokio::test]
            async fn test_insert_then_find_round_trip() {
                let store = $factory;
                let original = create_test_user("Alice", "alice@test.com", 30, 4.5, true);
                let created = store.insert(original.clone()).await.unwrap();

                let found = store
                    .find_by_id(created.id, &[], Visibility::Active)
                    .await
                    .unwrap()
                    .expect("inserted row should be visible");
                assert_eq!(found, created);
                assert_same_fields(&found, &original);
            }

            #[tokio::test]
            async fn test_find_missing() {
                let store = $factory;
                let found = store
                    .find_by_id(424242, &[], Visibility::All)
                    .await
                    .unwrap();
                assert!(found.is_none());
            }

            #[tokio::test]
            async fn test_save_overwrites_live_row() {
                let store = $factory;
                let mut user = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();

                user.name = "Alicia".to_string();
                user.age = 31;
                assert_eq!(store.save(&user).await.unwrap(), 1);

                let found = store
                    .find_by_id(user.id, &[], Visibility::Active)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found.name, "Alicia");
                assert_eq!(found.age, 31);
                assert_eq!(found.created_at, user.created_at);
            }

            #[tokio::test]
            async fn test_save_skips_missing_and_tombstoned() {
                let store = $factory;
                let mut ghost = create_test_user("Ghost", "ghost@test.com", 1, 0.0, false);
                ghost.id = 987654;
                assert_eq!(store.save(&ghost).await.unwrap(), 0);

                let user = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();
                store.soft_delete(user.id).await.unwrap();
                assert_eq!(store.save(&user).await.unwrap(), 0);
            }

            #[tokio::test]
            async fn test_update_fields_touches_only_named_columns() {
                let store = $factory;
                let user = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();

                let mut fields = Map::new();
                fields.insert("email".to_string(), json!("alice@new.com"));
                fields.insert("active".to_string(), json!(false));
                assert_eq!(store.update_fields(user.id, &fields).await.unwrap(), 1);

                let found = store
                    .find_by_id(user.id, &[], Visibility::Active)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found.email, "alice@new.com");
                assert!(!found.active);
                assert_eq!(found.name, "Alice");
                assert_eq!(found.age, 30);

                assert_eq!(store.update_fields(424242, &fields).await.unwrap(), 0);
            }

            #[tokio::test]
            async fn test_update_fields_unknown_column_is_an_error() {
                let store = $factory;
                let user = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();

                let mut fields = Map::new();
                fields.insert("favourite_colour".to_string(), json!("green"));
                assert!(store.update_fields(user.id, &fields).await.is_err());
            }

            #[tokio::test]
            async fn test_soft_delete_and_clear_tombstone() {
                let store = $factory;
                let kept = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();
                let gone = store
                    .insert(create_test_user("Bob", "bob@test.com", 25, 3.0, false))
                    .await
                    .unwrap();

                assert_eq!(store.soft_delete(gone.id).await.unwrap(), 1);
                assert_eq!(store.soft_delete(gone.id).await.unwrap(), 0);

                assert!(store
                    .find_by_id(gone.id, &[], Visibility::Active)
                    .await
                    .unwrap()
                    .is_none());
                let tombstoned = store
                    .find_by_id(gone.id, &[], Visibility::All)
                    .await
                    .unwrap()
                    .unwrap();
                assert!(tombstoned.deleted_at.is_some());

                let active = CompiledQuery::new();
                let all = CompiledQuery::new().with_visibility(Visibility::All);
                let deleted = CompiledQuery::new().with_visibility(Visibility::OnlyDeleted);
                assert_eq!(store.count(&active).await.unwrap(), 1);
                assert_eq!(store.count(&all).await.unwrap(), 2);
                let only_deleted = store.query(&deleted, None).await.unwrap();
                assert_eq!(only_deleted.len(), 1);
                assert_eq!(only_deleted[0].id, gone.id);

                assert_eq!(store.clear_tombstone(gone.id).await.unwrap(), 1);
                assert_eq!(store.clear_tombstone(gone.id).await.unwrap(), 0);
                assert_eq!(store.clear_tombstone(kept.id).await.unwrap(), 0);
                assert_eq!(store.count(&active).await.unwrap(), 2);
            }

            #[tokio::test]
            async fn test_hard_delete() {
                let store = $factory;
                let user = store
                    .insert(create_test_user("Alice", "alice@test.com", 30, 4.5, true))
                    .await
                    .unwrap();
                store.soft_delete(user.id).await.unwrap();

                assert_eq!(store.hard_delete(user.id).await.unwrap(), 1);
                assert_eq!(store.hard_delete(user.id).await.unwrap(), 0);
                assert!(store
                    .find_by_id(user.id, &[], Visibility::All)
                    .await
                    .unwrap()
                    .is_none());
            }

            // ==================================================================
            // Queries
            // ==================================================================

            #[tokio::test]
            async fn test_comparison_filters() {
                let store = $factory;
                seed_users(&store, 6).await;

                let order = "age";
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", ">", 4).with_order(order)).await,
                    vec![5, 6]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", "<=", 2).with_order(order)).await,
                    vec![1, 2]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", "<>", 3).filter("age", "<", 5).with_order(order))
                        .await,
                    vec![1, 2, 4]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("active", "=", true).with_order(order)).await,
                    vec![2, 4, 6]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("name", "=", "user03")).await,
                    vec![3]
                );
            }

            #[tokio::test]
            async fn test_in_filter() {
                let store = $factory;
                seed_users(&store, 6).await;

                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", "in", json!([1, 3, 5])).with_order("age"))
                        .await,
                    vec![1, 3, 5]
                );
                assert!(ages(&store, FilterRequest::new().filter("age", "in", json!([]))).await.is_empty());
            }

            #[tokio::test]
            async fn test_between_filter() {
                let store = $factory;
                seed_users(&store, 6).await;

                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", "between", json!([2, 4])).with_order("age"))
                        .await,
                    vec![2, 3, 4]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", "between", json!([5, null])).with_order("age"))
                        .await,
                    vec![5, 6]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("score", "between", json!([null, 1.0])).with_order("age"))
                        .await,
                    vec![1, 2]
                );
            }

            #[tokio::test]
            async fn test_string_values_take_the_column_type() {
                let store = $factory;
                seed_users(&store, 10).await;

                let order = "age";
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", ">", "5").with_order(order)).await,
                    vec![6, 7, 8, 9, 10]
                );
                assert_eq!(ages(&store, FilterRequest::new().filter("age", "=", "10")).await, vec![10]);
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("age", "in", json!(["1", "2"])).with_order(order))
                        .await,
                    vec![1, 2]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("score", "between", json!(["1", "2.5"])).with_order(order))
                        .await,
                    vec![2, 3, 4, 5]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("active", "=", "true").filter("age", "<=", "4").with_order(order))
                        .await,
                    vec![2, 4]
                );

                let count = store
                    .count(&compiled(FilterRequest::new().filter("age", "<", "3")))
                    .await
                    .unwrap();
                assert_eq!(count, 2);
            }

            #[tokio::test]
            async fn test_value_the_column_cannot_take_is_a_query_error() {
                let store = $factory;
                seed_users(&store, 3).await;

                let err = store
                    .query(&compiled(FilterRequest::new().filter("age", "=", "ten")), None)
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::Query { .. }), "got {:?}", err);

                let err = store
                    .count(&compiled(FilterRequest::new().filter("active", "in", json!(["maybe"]))))
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::Query { .. }), "got {:?}", err);
            }

            #[tokio::test]
            async fn test_like_filter_across_fields() {
                let store = $factory;
                store
                    .insert(create_test_user("Alice", "alice@acme.com", 30, 1.0, true))
                    .await
                    .unwrap();
                store
                    .insert(create_test_user("Bob", "bob@globex.com", 40, 1.0, true))
                    .await
                    .unwrap();
                store
                    .insert(create_test_user("Carol", "carol@initech.com", 50, 1.0, true))
                    .await
                    .unwrap();

                assert_eq!(
                    ages(&store, FilterRequest::new().filter("name|email", "like", "ali|globex").with_order("age"))
                        .await,
                    vec![30, 40]
                );
                assert_eq!(
                    ages(&store, FilterRequest::new().filter("name", "LIKE", "CAROL")).await,
                    vec![50]
                );
                assert!(ages(&store, FilterRequest::new().filter("email", "like", "umbrella")).await.is_empty());
            }

            #[tokio::test]
            async fn test_multi_key_order_and_window() {
                let store = $factory;
                seed_users(&store, 6).await;

                // active desc groups evens first, age desc inside each group
                let query = compiled(FilterRequest::new().with_order("active desc, age desc"));
                let all: Vec<i64> = store
                    .query(&query, None)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|u| u.age)
                    .collect();
                assert_eq!(all, vec![6, 4, 2, 5, 3, 1]);

                let window: Vec<i64> = store
                    .query(&query, Some(Window::new(2, 3)))
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|u| u.age)
                    .collect();
                assert_eq!(window, vec![2, 5, 3]);

                let past_end = store.query(&query, Some(Window::new(10, 5))).await.unwrap();
                assert!(past_end.is_empty());
            }

            #[tokio::test]
            async fn test_count_uses_constraints_and_visibility() {
                let store = $factory;
                let users = seed_users(&store, 6).await;
                store.soft_delete(users[5].id).await.unwrap();

                let query = compiled(FilterRequest::new().filter("age", ">=", 3));
                assert_eq!(store.count(&query).await.unwrap(), 3);

                let query = compiled(
                    FilterRequest::new()
                        .filter("age", ">=", 3)
                        .filter("deleted", "=", "all"),
                );
                assert_eq!(store.count(&query).await.unwrap(), 4);
            }

            #[tokio::test]
            async fn test_concurrent_inserts_get_distinct_identities() {
                let store = std::sync::Arc::new($factory);
                let mut handles = Vec::new();
                for i in 0..10 {
                    let store = store.clone();
                    handles.push(tokio::spawn(async move {
                        store
                            .insert(create_test_user(&format!("u{}", i), "u@test.com", i, 0.0, true))
                            .await
                            .unwrap()
                            .id
                    }));
                }

                let mut ids = Vec::new();
                for handle in handles {
                    ids.push(handle.await.unwrap());
                }
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), 10);
            }
        }
    };
}
