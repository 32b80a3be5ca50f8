use async_trait::async_trait;
use core_logic::{
    AmountPolicies, AmountPolicy, DelayPolicy, DelayRange, DelaysConfig, MemoryResultSink,
    ModuleAdapter, ModuleInvocationResult, ModuleKind, Network, NonceAllocator,
    OrchestratorConfig, ProxyConfig, SchedulerError, WalletRecord, WalletScheduler, WalletState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const SOURCE_CHAIN: u64 = 1135;

fn network(id: u64) -> Network {
    Network {
        id,
        name: format!("chain-{}", id),
        rpc_url: format!("https://rpc.chain-{}.example", id),
        currency_address: "0x0000000000000000000000000000000000000000".to_string(),
        is_enabled: true,
        supports_deposits: true,
    }
}

fn orchestrator(workers: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        source_chain_id: SOURCE_CHAIN,
        worker_amount: workers,
        max_empty_passes: 3,
        delays: DelaysConfig::zero(),
        amounts: AmountPolicies::default(),
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    /// Reserve a nonce, then fail before broadcast and hand it back.
    FailBeforeBroadcast,
    Panic,
}

struct MockModule {
    name: &'static str,
    kind: ModuleKind,
    destinations: Vec<Network>,
    behavior: Behavior,
    nonces: Option<Arc<NonceAllocator>>,
    calls: AtomicUsize,
}

impl MockModule {
    fn new(name: &'static str, kind: ModuleKind, destinations: Vec<Network>) -> Self {
        Self {
            name,
            kind,
            destinations,
            behavior: Behavior::Succeed,
            nonces: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn with_nonces(mut self, nonces: Arc<NonceAllocator>) -> Self {
        self.nonces = Some(nonces);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleAdapter for MockModule {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> ModuleKind {
        self.kind
    }

    async fn available_destinations(
        &self,
        _wallet_number: u64,
        _proxy: Option<&ProxyConfig>,
    ) -> Vec<Network> {
        self.destinations.clone()
    }

    async fn process_transaction(
        &self,
        wallet: &WalletRecord,
        _destination: &Network,
        _amount: &AmountPolicy,
        _wallet_number: u64,
    ) -> ModuleInvocationResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => {
                if let Some(nonces) = &self.nonces {
                    let n = nonces.reserve(&wallet.address).unwrap();
                    nonces.commit(&wallet.address, n).unwrap();
                }
                ModuleInvocationResult::success(self.name, Some(format!("0x{:064x}", call)))
            }
            Behavior::FailBeforeBroadcast => {
                if let Some(nonces) = &self.nonces {
                    let n = nonces.reserve(&wallet.address).unwrap();
                    nonces.release(&wallet.address, n).unwrap();
                }
                ModuleInvocationResult::failure(self.name, "Broadcast failed: rejected", None)
            }
            Behavior::Panic => panic!("adapter exploded"),
        }
    }
}

fn dynm(module: Arc<MockModule>) -> Arc<dyn ModuleAdapter> {
    module
}

fn scheduler(
    config: OrchestratorConfig,
    modules: Vec<Arc<dyn ModuleAdapter>>,
    sink: Arc<MemoryResultSink>,
) -> Arc<WalletScheduler> {
    let delays = Arc::new(DelayPolicy::from_seed(config.delays, 1).unwrap());
    Arc::new(WalletScheduler::new(config, modules, delays, sink).with_seed(42))
}

#[tokio::test]
async fn test_completes_exact_contract_count() {
    let sink = Arc::new(MemoryResultSink::new());
    let msg = Arc::new(MockModule::new("Msg", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));
    let bridge = Arc::new(MockModule::new(
        "Bridge",
        ModuleKind::Bridge,
        vec![network(10), network(8453)],
    ));

    let wallet = WalletRecord::new("0xw", "key").with_contracts_count(2);
    let report = scheduler(orchestrator(1), vec![dynm(msg.clone()), dynm(bridge.clone())], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let records = sink.records_for("0xw").await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.success));
    assert!(records.iter().all(|r| r.module == "Msg" || r.module == "Bridge"));
    for r in records.iter().filter(|r| r.module == "Bridge") {
        assert!(r.network_id == 10 || r.network_id == 8453);
    }
    assert_eq!(msg.calls() + bridge.calls(), 2);

    let wallet_report = report.wallet("0xw").unwrap();
    assert_eq!(wallet_report.state, WalletState::Completed);
    assert_eq!(wallet_report.invocations, 2);
    assert_eq!(wallet_report.ordinal, Some(1));
}

#[tokio::test]
async fn test_pinned_chain_is_never_substituted() {
    let sink = Arc::new(MemoryResultSink::new());
    let msg = Arc::new(MockModule::new("Msg", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));
    let bridge = Arc::new(MockModule::new(
        "Bridge",
        ModuleKind::Bridge,
        vec![network(10), network(8453)],
    ));

    let wallet = WalletRecord::new("0xpinned", "key")
        .with_contracts_count(5)
        .with_bridge_chain_id(Some(99));
    let report = scheduler(orchestrator(1), vec![dynm(msg.clone()), dynm(bridge.clone())], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let records = sink.records().await;
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.module == "Msg"));
    assert!(records.iter().all(|r| r.network_id != 99));
    assert_eq!(bridge.calls(), 0);
    assert_eq!(report.completed(), 1);
}

#[tokio::test]
async fn test_pinned_chain_used_when_available() {
    let sink = Arc::new(MemoryResultSink::new());
    let bridge = Arc::new(MockModule::new(
        "Bridge",
        ModuleKind::Bridge,
        vec![network(10), network(8453)],
    ));

    let wallet = WalletRecord::new("0xpin", "key")
        .with_contracts_count(4)
        .with_bridge_chain_id(Some(8453));
    scheduler(orchestrator(1), vec![dynm(bridge)], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let records = sink.records().await;
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.network_id == 8453));
}

#[tokio::test]
async fn test_bridge_never_targets_source_chain() {
    let sink = Arc::new(MemoryResultSink::new());
    let mut disabled = network(56);
    disabled.is_enabled = false;
    let bridge = Arc::new(MockModule::new(
        "Bridge",
        ModuleKind::Bridge,
        vec![network(SOURCE_CHAIN), disabled, network(10)],
    ));

    let wallet = WalletRecord::new("0xsrc", "key").with_contracts_count(6);
    scheduler(orchestrator(1), vec![dynm(bridge)], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let records = sink.records().await;
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.network_id == 10));
}

#[tokio::test]
async fn test_no_eligible_modules_aborts_wallet() {
    let sink = Arc::new(MemoryResultSink::new());
    let empty = Arc::new(MockModule::new("Empty", ModuleKind::Bridge, vec![]));
    let source_only = Arc::new(MockModule::new(
        "SourceOnly",
        ModuleKind::Bridge,
        vec![network(SOURCE_CHAIN)],
    ));

    let wallet = WalletRecord::new("0xstuck", "key").with_contracts_count(3);
    let report = scheduler(orchestrator(1), vec![dynm(empty), dynm(source_only)], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let wallet_report = report.wallet("0xstuck").unwrap();
    assert_eq!(
        wallet_report.state,
        WalletState::Aborted(SchedulerError::NoEligibleModules { passes: 3 })
    );
    assert_eq!(wallet_report.invocations, 0);
    assert!(sink.records().await.is_empty());
}

#[tokio::test]
async fn test_failures_count_toward_quota() {
    let sink = Arc::new(MemoryResultSink::new());
    let failing = Arc::new(
        MockModule::new("Flaky", ModuleKind::Local, vec![network(SOURCE_CHAIN)])
            .behaving(Behavior::FailBeforeBroadcast),
    );

    let wallet = WalletRecord::new("0xflaky", "key").with_contracts_count(3);
    let report = scheduler(orchestrator(1), vec![dynm(failing)], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let records = sink.records().await;
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| !r.success && r.tx_hash.is_none()));
    assert_eq!(report.completed(), 1);
}

#[tokio::test]
async fn test_failed_broadcast_nonce_is_reused() {
    let sink = Arc::new(MemoryResultSink::new());
    let nonces = Arc::new(NonceAllocator::new());
    nonces.seed("0xnonce", 7);

    let bridge = Arc::new(
        MockModule::new("Bridge", ModuleKind::Bridge, vec![network(10)])
            .behaving(Behavior::FailBeforeBroadcast)
            .with_nonces(nonces.clone()),
    );

    let wallet = WalletRecord::new("0xnonce", "key").with_contracts_count(1);
    scheduler(orchestrator(1), vec![dynm(bridge)], sink.clone())
        .run(vec![wallet], CancellationToken::new())
        .await;

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(nonces.outstanding("0xnonce"), None);
    assert_eq!(nonces.reserve("0xnonce").unwrap(), 7);
}

#[tokio::test]
async fn test_panicking_wallet_does_not_affect_others() {
    let sink = Arc::new(MemoryResultSink::new());
    let ok = Arc::new(MockModule::new("Ok", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));
    let boom = Arc::new(
        MockModule::new("Boom", ModuleKind::Bridge, vec![network(10)]).behaving(Behavior::Panic),
    );

    // Only the pinned wallet can reach the panicking bridge.
    let doomed = WalletRecord::new("0xdoomed", "key")
        .with_contracts_count(50)
        .with_bridge_chain_id(Some(10));
    let healthy: Vec<WalletRecord> = (0..4)
        .map(|i| {
            WalletRecord::new(format!("0xok{}", i), "key")
                .with_contracts_count(2)
                .with_bridge_chain_id(Some(4242))
        })
        .collect();

    let mut wallets = vec![doomed];
    wallets.extend(healthy);

    let report = scheduler(orchestrator(2), vec![dynm(ok), dynm(boom)], sink.clone())
        .run(wallets, CancellationToken::new())
        .await;

    assert_eq!(report.wallets.len(), 5);
    assert!(matches!(
        report.wallet("0xdoomed").unwrap().state,
        WalletState::Aborted(SchedulerError::WalletLoopAborted { .. })
    ));
    for i in 0..4 {
        let address = format!("0xok{}", i);
        assert_eq!(report.wallet(&address).unwrap().state, WalletState::Completed);
        assert_eq!(sink.records_for(&address).await.len(), 2);
    }
}

#[tokio::test]
async fn test_ordinals_are_unique_across_workers() {
    let sink = Arc::new(MemoryResultSink::new());
    let msg = Arc::new(MockModule::new("Msg", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));

    let wallets: Vec<WalletRecord> = (0..20)
        .map(|i| WalletRecord::new(format!("0x{:02}", i), "key").with_contracts_count(1))
        .collect();

    let report = scheduler(orchestrator(4), vec![dynm(msg)], sink.clone())
        .run(wallets, CancellationToken::new())
        .await;

    let mut ordinals: Vec<u64> = report.wallets.iter().filter_map(|w| w.ordinal).collect();
    ordinals.sort_unstable();
    assert_eq!(ordinals, (1..=20).collect::<Vec<u64>>());
    assert_eq!(sink.records().await.len(), 20);
}

#[tokio::test]
async fn test_pre_pass_recorded_only_when_it_does_something() {
    struct Unwrap {
        broadcast: bool,
    }

    #[async_trait]
    impl ModuleAdapter for Unwrap {
        fn name(&self) -> &str {
            "Weth"
        }
        fn kind(&self) -> ModuleKind {
            ModuleKind::Local
        }
        async fn available_destinations(&self, _: u64, _: Option<&ProxyConfig>) -> Vec<Network> {
            vec![network(SOURCE_CHAIN)]
        }
        async fn process_transaction(
            &self,
            _: &WalletRecord,
            _: &Network,
            _: &AmountPolicy,
            _: u64,
        ) -> ModuleInvocationResult {
            let hash = self.broadcast.then(|| "0xfeed".to_string());
            ModuleInvocationResult::success("Weth", hash)
        }
    }

    for (broadcast, expected) in [(false, 1), (true, 2)] {
        let sink = Arc::new(MemoryResultSink::new());
        let msg = Arc::new(MockModule::new("Msg", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));
        let config = orchestrator(1);
        let delays = Arc::new(DelayPolicy::new(config.delays).unwrap());
        let scheduler = Arc::new(
            WalletScheduler::new(config, vec![dynm(msg)], delays, sink.clone())
                .with_pre_pass(Arc::new(Unwrap { broadcast })),
        );

        scheduler
            .run(
                vec![WalletRecord::new("0xpre", "key").with_contracts_count(1)],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(sink.records().await.len(), expected);
    }
}

#[tokio::test]
async fn test_cancelled_run_reports_unstarted_wallets() {
    let sink = Arc::new(MemoryResultSink::new());
    let msg = Arc::new(MockModule::new("Msg", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));
    let token = CancellationToken::new();
    token.cancel();

    let wallets = vec![
        WalletRecord::new("0xa", "key"),
        WalletRecord::new("0xb", "key"),
    ];
    let report = scheduler(orchestrator(1), vec![dynm(msg.clone())], sink.clone())
        .run(wallets, token)
        .await;

    assert_eq!(report.wallets.len(), 2);
    assert_eq!(report.completed(), 0);
    assert!(report
        .wallets
        .iter()
        .all(|w| w.state == WalletState::Aborted(SchedulerError::Cancelled)));
    assert_eq!(msg.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_each_delay_point_is_awaited() {
    let sink = Arc::new(MemoryResultSink::new());
    let msg = Arc::new(MockModule::new("Msg", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));
    let unwrap = Arc::new(MockModule::new("Weth", ModuleKind::Local, vec![network(SOURCE_CHAIN)]));

    let mut config = orchestrator(1);
    config.delays = DelaysConfig {
        pre_start: DelayRange::new(1.0, 1.0),
        post_special_module: DelayRange::new(10_000.0, 10_000.0),
        between_wallets: DelayRange::new(100.0, 100.0),
        between_transactions: DelayRange::new(10.0, 10.0),
        between_modules: DelayRange::new(1_000.0, 1_000.0),
    };
    let delays = Arc::new(DelayPolicy::from_seed(config.delays, 1).unwrap());
    let scheduler = Arc::new(
        WalletScheduler::new(config, vec![dynm(msg.clone())], delays, sink.clone())
            .with_pre_pass(dynm(unwrap.clone()))
            .with_seed(42),
    );

    let wallets = vec![
        WalletRecord::new("0xa", "key").with_contracts_count(2),
        WalletRecord::new("0xb", "key").with_contracts_count(1),
    ];
    let start = tokio::time::Instant::now();
    let report = scheduler.run(wallets, CancellationToken::new()).await;
    let elapsed = start.elapsed();

    // 0xa: pre-start 1 + post-special 10000 + 10 + between-modules 1000 + 10
    // 0xb: pre-start 1 + post-special 10000 + between-wallets 100 + 10
    assert_eq!(elapsed.as_secs(), 11_021 + 10_111);
    assert_eq!(report.completed(), 2);
    assert_eq!(unwrap.calls(), 2);
    assert_eq!(msg.calls(), 3);
    assert_eq!(sink.records().await.len(), 5);
}
