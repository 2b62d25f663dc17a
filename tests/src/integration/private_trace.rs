//! # Private Trace Flows
//!
//! Drives `priv_traceTransaction` end to end over an in-memory privacy
//! network: blocks are mined the way a node processes them (private state
//! committed, group metadata recorded) and traces are rebuilt by replay.
//!
//! ## Flows Tested:
//!
//! 1. **Deploy then call**: one `call` record for `set(uint256)`
//! 2. **Visibility**: outsiders, unknown hashes and orphaned blocks yield `[]`
//! 3. **Multi-tenancy**: non-members are rejected before any lookup
//! 4. **Non-persistence**: replay never changes committed private state
//! 5. **Determinism and concurrency**: identical requests, identical bytes

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::{json, Value};

    use qc_18_private_tracing::prelude::*;
    use qc_18_private_tracing::test_utils::{call_payload, MinedBlock, PrivacyNetwork, SENDER};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn alice() -> PrivacyUserId {
        PrivacyUserId::new("A1aVtMxLCUHmBVHXoZzzBgPbW/wj5axDpW9X8l91SGo=")
    }

    fn bob() -> PrivacyUserId {
        PrivacyUserId::new("Ko2bVqD+nNlNYL5EE7y3IdOnviftjiizpjRt+HTuFBs=")
    }

    fn user(key: PrivacyUserId) -> AuthenticatedUser {
        AuthenticatedUser {
            username: key.as_str().to_string(),
            privacy_public_key: Some(key),
        }
    }

    fn single_tenant_method(network: &PrivacyNetwork, node: PrivacyUserId) -> PrivTraceTransaction {
        let config = TraceConfig {
            node_privacy_user_id: Some(node),
            ..TraceConfig::default()
        };
        let service = Arc::new(network.service(config.clone()).unwrap());
        PrivTraceTransaction::for_config(service, &config).unwrap()
    }

    fn params(group: &PrivacyGroupId, pmt_hash: &Hash) -> Value {
        json!([group.as_str(), pmt_hash.to_string()])
    }

    /// Deploys the storage contract, then mines `set(value)` against it.
    async fn deploy_and_set(
        network: &PrivacyNetwork,
        group: &PrivacyGroupId,
        value: u64,
    ) -> (Address, MinedBlock) {
        let contract = network.deploy(group, 0).await.unwrap();
        let mined = network
            .mine_block(vec![network.call(group, 1, contract, &call_payload(value))])
            .await
            .unwrap();
        (contract, mined)
    }

    /// Chain index that answers after a fixed delay.
    struct SlowChain {
        inner: Arc<InMemoryChain>,
        delay: Duration,
    }

    #[async_trait]
    impl ChainIndex for SlowChain {
        async fn block_hash_by_number(&self, number: u64) -> Result<Option<Hash>, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.block_hash_by_number(number).await
        }

        async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StoreError> {
            self.inner.block_by_hash(hash).await
        }

        async fn block_header_by_hash(
            &self,
            hash: &Hash,
        ) -> Result<Option<BlockHeader>, StoreError> {
            self.inner.block_header_by_hash(hash).await
        }
    }

    /// Transaction store that answers the first lookup at once and every
    /// later one after a fixed delay, so a request stalls mid-replay.
    struct StallingTransactionStore {
        inner: Arc<InMemoryPrivateTransactionStore>,
        lookups: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl PrivateTransactionStore for StallingTransactionStore {
        async fn find_by_pmt_hash(
            &self,
            pmt_hash: &Hash,
            caller: &PrivacyUserId,
        ) -> Result<Option<ExecutedPrivateTransaction>, StoreError> {
            if self.lookups.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.find_by_pmt_hash(pmt_hash, caller).await
        }
    }

    // =============================================================================
    // INTEGRATION TESTS: DEPLOY AND CALL
    // =============================================================================

    /// A member traces `set(uint256)` and gets exactly one top-level call.
    #[tokio::test]
    async fn test_member_traces_contract_call() {
        init_tracing();
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice(), bob()]);
        let (contract, mined) = deploy_and_set(&network, &group, 42).await;
        let method = single_tenant_method(&network, alice());

        let result = method
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap();

        let records = result.as_array().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["type"], "call");
        assert_eq!(record["action"]["callType"], "call");
        assert_eq!(record["action"]["from"], SENDER.to_string());
        assert_eq!(record["action"]["to"], contract.to_string());
        assert_eq!(record["action"]["value"], "0x0");
        assert!(record["action"]["input"]
            .as_str()
            .unwrap()
            .starts_with("0x60fe47b1"));
        assert_eq!(record["traceAddress"], json!([]));
        assert_eq!(record["subtraces"], 0);
        assert_eq!(record["blockHash"], mined.block.hash().to_string());
        assert_eq!(record["blockNumber"], mined.block.number());
        assert_eq!(record["transactionHash"], mined.pmt_hashes[0].to_string());
        assert_eq!(record["transactionPosition"], 0);
        assert!(record.get("error").is_none());
    }

    /// The deployment itself traces as a `create` with the new address.
    #[tokio::test]
    async fn test_member_traces_contract_creation() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (contract, _) = deploy_and_set(&network, &group, 1).await;
        let creation_block = network.chain.canonical_header(1).unwrap().hash;
        let pmt_hash = network
            .chain
            .block_by_hash(&creation_block)
            .await
            .unwrap()
            .unwrap()
            .transactions[0];

        let method = single_tenant_method(&network, alice());
        let result = method.response(&params(&group, &pmt_hash), None).await.unwrap();

        let records = result.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["type"], "create");
        assert_eq!(records[0]["action"]["from"], SENDER.to_string());
        assert_eq!(records[0]["result"]["address"], contract.to_string());
    }

    /// Later transactions in the same block replay on top of earlier ones.
    #[tokio::test]
    async fn test_traces_second_transaction_in_block() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let contract = network.deploy(&group, 0).await.unwrap();
        let mined = network
            .mine_block(vec![
                network.call(&group, 1, contract, &call_payload(1)),
                network.call(&group, 2, contract, &call_payload(2)),
            ])
            .await
            .unwrap();

        let method = single_tenant_method(&network, alice());
        let result = method
            .response(&params(&group, &mined.pmt_hashes[1]), None)
            .await
            .unwrap();

        assert_eq!(result.as_array().unwrap().len(), 1);
        assert_eq!(result[0]["transactionPosition"], 1);
        assert!(result[0]["action"]["input"]
            .as_str()
            .unwrap()
            .ends_with("02"));
    }

    /// Another group's transactions in the same block do not leak in.
    #[tokio::test]
    async fn test_groups_replay_in_isolation() {
        let network = PrivacyNetwork::new();
        let ours = network.create_group("ours", &[alice()]);
        let theirs = network.create_group("theirs", &[bob()]);
        let contract = network.deploy(&ours, 0).await.unwrap();
        let mined = network
            .mine_block(vec![
                network.creation(&theirs, 0, &[0x60, 0x00]),
                network.call(&ours, 1, contract, &call_payload(5)),
            ])
            .await
            .unwrap();

        let method = single_tenant_method(&network, alice());
        let result = method
            .response(&params(&ours, &mined.pmt_hashes[1]), None)
            .await
            .unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);
        assert_eq!(result[0]["type"], "call");

        let other = method
            .response(&params(&theirs, &mined.pmt_hashes[0]), None)
            .await
            .unwrap();
        assert_eq!(other, json!([]));
    }

    // =============================================================================
    // INTEGRATION TESTS: VISIBILITY
    // =============================================================================

    #[tokio::test]
    async fn test_outsider_and_unknown_hash_get_empty_result() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;

        let outsider = single_tenant_method(&network, bob());
        let result = outsider
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap();
        assert_eq!(result, json!([]));

        let member = single_tenant_method(&network, alice());
        let result = member.response(&params(&group, &Hash::ZERO), None).await.unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn test_wrong_group_gets_empty_result() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        network.create_group("unrelated", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;

        let method = single_tenant_method(&network, alice());
        let result = method
            .response(&params(&PrivacyGroupId::new("unrelated"), &mined.pmt_hashes[0]), None)
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    /// After a reorg drops the block, the transaction is no longer traceable.
    #[tokio::test]
    async fn test_reorged_block_gets_empty_result() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        let method = single_tenant_method(&network, alice());
        let request = params(&group, &mined.pmt_hashes[0]);

        assert_eq!(method.response(&request, None).await.unwrap().as_array().unwrap().len(), 1);

        network.orphan_block(mined.block.number()).unwrap();
        assert_eq!(method.response(&request, None).await.unwrap(), json!([]));
    }

    /// A transaction historically rejected still resolves, with no frames.
    #[tokio::test]
    async fn test_invalid_transaction_traces_empty() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let contract = network.deploy(&group, 0).await.unwrap();
        let mined = network
            .mine_block(vec![
                network.call(&group, 9, contract, &call_payload(1)),
                network.call(&group, 1, contract, &call_payload(2)),
            ])
            .await
            .unwrap();
        assert!(matches!(mined.statuses[0], TransactionStatus::Invalid { .. }));
        assert_eq!(mined.statuses[1], TransactionStatus::Successful);

        let config = TraceConfig {
            node_privacy_user_id: Some(alice()),
            ..TraceConfig::default()
        };
        let service = Arc::new(network.service(config.clone()).unwrap());
        let method = PrivTraceTransaction::for_config(service.clone(), &config).unwrap();
        let invalid = method
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap();
        assert_eq!(invalid, json!([]));

        let valid = method
            .response(&params(&group, &mined.pmt_hashes[1]), None)
            .await
            .unwrap();
        assert_eq!(valid.as_array().unwrap().len(), 1);

        let stats = service.stats().await;
        assert_eq!(stats.untraced_invalid, 1);
        assert_eq!(stats.traced, 1);
        assert_eq!(stats.empty, 0);
    }

    // =============================================================================
    // INTEGRATION TESTS: MULTI-TENANCY
    // =============================================================================

    #[tokio::test]
    async fn test_multi_tenant_rejects_non_member() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;

        let config = TraceConfig {
            authorization: AuthorizationMode::MultiTenant,
            ..TraceConfig::default()
        };
        let service = Arc::new(network.service(config.clone()).unwrap());
        let method = PrivTraceTransaction::for_config(service.clone(), &config).unwrap();
        let request = params(&group, &mined.pmt_hashes[0]);

        let err = method.response(&request, Some(&user(bob()))).await.unwrap_err();
        assert_eq!(err.code, codes::UNAUTHORIZED);

        let result = method.response(&request, Some(&user(alice()))).await.unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);

        let stats = service.stats().await;
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.unauthorized, 1);
        assert_eq!(stats.traced, 1);
    }

    /// Removed members lose access even to transactions they could decrypt.
    #[tokio::test]
    async fn test_multi_tenant_removed_member_rejected() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice(), bob()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        network.groups.remove_member(&group, &bob());

        let service = network.multi_tenant_service().unwrap();
        let err = service
            .result_by_transaction_hash(&TraceRequest {
                privacy_group_id: group,
                transaction_hash: mined.pmt_hashes[0],
                caller: bob(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::Unauthorized { .. }));
    }

    // =============================================================================
    // INTEGRATION TESTS: NON-PERSISTENCE, DETERMINISM, CONCURRENCY
    // =============================================================================

    #[tokio::test]
    async fn test_replay_leaves_private_state_untouched() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        let before = network.storage.checksum();
        let method = single_tenant_method(&network, alice());

        method
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap();
        method.response(&params(&group, &Hash::ZERO), None).await.unwrap();

        network.corrupt_recorded_root(&group, &mined.block.hash());
        let err = method
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::INTERNAL_ERROR);

        assert_eq!(network.storage.checksum(), before);
        assert_eq!(network.storage.open_snapshots(), 0);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_byte_identical() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        let method = single_tenant_method(&network, alice());
        let request = params(&group, &mined.pmt_hashes[0]);

        let first = serde_json::to_string(&method.response(&request, None).await.unwrap()).unwrap();
        let second = method.response(&request, None).await.unwrap();
        let second = serde_json::to_string(&second).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_agree() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        let service = Arc::new(network.single_tenant_service(alice()).unwrap());

        let request = TraceRequest {
            privacy_group_id: group,
            transaction_hash: mined.pmt_hashes[0],
            caller: alice(),
        };
        let results = join_all((0..16).map(|_| {
            let service = Arc::clone(&service);
            let request = request.clone();
            tokio::spawn(async move { service.result_by_transaction_hash(&request).await })
        }))
        .await;

        let expected = service.result_by_transaction_hash(&request).await.unwrap();
        for result in results {
            assert_eq!(result.unwrap().unwrap(), expected);
        }
        assert_eq!(network.storage.open_snapshots(), 0);
        assert_eq!(service.stats().await.traced, 17);
    }

    // =============================================================================
    // INTEGRATION TESTS: FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_slow_chain_times_out() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;

        let ports = TracePorts {
            chain: Arc::new(SlowChain {
                inner: network.chain.clone(),
                delay: Duration::from_millis(500),
            }),
            ..network.ports()
        };
        let config = TraceConfig {
            node_privacy_user_id: Some(alice()),
            request_timeout_ms: 20,
            ..TraceConfig::default()
        };
        let service = Arc::new(TraceQueryService::new(ports, config.clone()).unwrap());
        let method = PrivTraceTransaction::for_config(service, &config).unwrap();

        let err = method
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::TIMEOUT);
        assert_eq!(network.storage.open_snapshots(), 0);
    }

    /// The deadline fires after the parent state was checked out; the
    /// abandoned replay must still hand its snapshot back.
    #[tokio::test]
    async fn test_timeout_mid_replay_releases_snapshot() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        let served_before = network.storage.checkouts_served();

        let ports = TracePorts {
            transactions: Arc::new(StallingTransactionStore {
                inner: network.transactions.clone(),
                lookups: AtomicUsize::new(0),
                delay: Duration::from_millis(500),
            }),
            ..network.ports()
        };
        let config = TraceConfig {
            node_privacy_user_id: Some(alice()),
            request_timeout_ms: 50,
            ..TraceConfig::default()
        };
        let service = TraceQueryService::new(ports, config).unwrap();

        let err = service
            .result_by_transaction_hash(&TraceRequest {
                privacy_group_id: group,
                transaction_hash: mined.pmt_hashes[0],
                caller: alice(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, TraceError::Timeout { timeout_ms: 50 });
        assert!(network.storage.checkouts_served() > served_before);
        assert_eq!(network.storage.open_snapshots(), 0);
        assert_eq!(service.stats().await.timeouts, 1);
    }

    /// Metadata that no longer lists the requested transaction: replay of
    /// the remaining entries succeeds but yields nothing to select.
    #[tokio::test]
    async fn test_transaction_missing_from_replay_is_internal_error() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let contract = network.deploy(&group, 0).await.unwrap();
        let mined = network
            .mine_block(vec![
                network.call(&group, 1, contract, &call_payload(1)),
                network.call(&group, 2, contract, &call_payload(2)),
            ])
            .await
            .unwrap();
        let block_hash = mined.block.hash();
        let mut metadata = network.metadata.get(&group, &block_hash).unwrap();
        metadata.transactions.truncate(1);
        network.metadata.put(group.clone(), block_hash, metadata);

        let service = Arc::new(network.single_tenant_service(alice()).unwrap());
        let err = service
            .result_by_transaction_hash(&TraceRequest {
                privacy_group_id: group.clone(),
                transaction_hash: mined.pmt_hashes[1],
                caller: alice(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::TraceReconstruction {
                source: ReplayError::TransactionNotReplayed(hash),
                ..
            } if hash == mined.pmt_hashes[1]
        ));
        assert_eq!(RpcError::from(err).code, codes::INTERNAL_ERROR);

        // The entry still listed traces normally.
        let records = service
            .result_by_transaction_hash(&TraceRequest {
                privacy_group_id: group,
                transaction_hash: mined.pmt_hashes[0],
                caller: alice(),
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(network.storage.open_snapshots(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_chain_maps_to_resource_unavailable() {
        let network = PrivacyNetwork::new();
        let group = network.create_group("storage-group", &[alice()]);
        let (_, mined) = deploy_and_set(&network, &group, 42).await;
        let method = single_tenant_method(&network, alice());

        network.chain.set_unavailable(true);
        let err = method
            .response(&params(&group, &mined.pmt_hashes[0]), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::RESOURCE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_malformed_params_rejected() {
        let network = PrivacyNetwork::new();
        let method = single_tenant_method(&network, alice());

        let err = method.response(&json!(["group"]), None).await.unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
    }
}
