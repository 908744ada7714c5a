// Stage-level pipeline tests: every stage is driven synchronously from the test thread.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use router_sim::address::Route;
    use router_sim::config::RouterConfig;
    use router_sim::latency::LatencyModel;
    use router_sim::packet::{Packet, PacketKind, PAYLOAD_WORDS};
    use router_sim::pipeline::RouterContext;
    use router_sim::priority::Priority;
    use router_sim::sink::{MemorySink, NullSink};
    use router_sim::stage::output::DELIVERY_HEADER;
    use router_sim::stage::{Classifier, Dispatcher, Forwarder, Generator, OutputWorker};

    fn fast_config() -> RouterConfig {
        let mut config = RouterConfig::default();
        config.classifier.latency_model = LatencyModel::None;
        config
    }

    fn packet(source: u32, destination: u32, kind: PacketKind) -> Packet {
        Packet::new(source, destination, kind, [0; PAYLOAD_WORDS], 0)
    }

    /// Run every stage until no queue holds a packet.
    fn drain_pipeline(ctx: &Arc<RouterContext>) {
        let classifier = Classifier::new(ctx.clone());
        let forwarder = Forwarder::new(ctx.clone());
        let outputs: Vec<_> = (0..ctx.ports.len())
            .map(|port| OutputWorker::new(ctx.clone(), port))
            .collect();
        while ctx.queued_packets() > 0 {
            classifier.process_pending();
            while forwarder.poll_once().is_some() {}
            for output in &outputs {
                output.deliver_pending();
            }
        }
    }

    #[test]
    fn test_created_matches_sum_of_bursts() {
        let ctx = RouterContext::new(fast_config(), Arc::new(NullSink)).unwrap();
        let mut generator = Generator::new(ctx.clone());
        let mut total = 0u64;
        for _ in 0..8 {
            total += u64::from(generator.run_burst());
            drain_pipeline(&ctx);
        }
        assert_eq!(ctx.counters.snapshot().created, total);
    }

    #[test]
    fn test_every_copy_is_delivered_or_rejected() {
        let sink = Arc::new(MemorySink::new());
        let mut config = fast_config();
        config.queues.input = 64;
        config.queues.lanes = router_sim::priority::PriorityTable::from_fn(|_| 32);
        config.queues.port = 16;
        config.generator.burst_min = 100;
        let ctx = RouterContext::new(config, sink.clone()).unwrap();
        let mut generator = Generator::new(ctx.clone());
        let classifier = Classifier::new(ctx.clone());
        let forwarder = Forwarder::new(ctx.clone());

        // Push bursts through without draining ports so every drop point fires.
        for _ in 0..6 {
            generator.run_burst();
            classifier.process_pending();
            while forwarder.poll_once().is_some() {}
        }
        drain_pipeline(&ctx);

        let counters = ctx.counters.snapshot();
        assert!(counters.rejected_input_full > 0);
        assert!(counters.rejected_output_full > 0);
        assert!(counters.rejected_source > 0);
        assert_eq!(counters.delivered + counters.rejected(), counters.allocated);
        assert_eq!(counters.allocated, counters.released);
        assert_eq!(counters.in_flight, 0);
        assert_eq!(
            sink.count_prefixed(DELIVERY_HEADER) as u64,
            counters.delivered
        );
    }

    #[test]
    fn test_high_lane_starves_lower_lanes() {
        let ctx = RouterContext::new(fast_config(), Arc::new(NullSink)).unwrap();
        let classifier = Classifier::new(ctx.clone());
        let forwarder = Forwarder::new(ctx.clone());
        for kind in [PacketKind::Other, PacketKind::Audio] {
            ctx.counters.record_created();
            ctx.input.push(packet(0x0100_0000, 0x2000_0000, kind)).unwrap();
        }
        for _ in 0..50 {
            ctx.counters.record_created();
            ctx.input
                .push(packet(0x0100_0000, 0x2000_0000, PacketKind::Video))
                .unwrap();
        }
        classifier.process_pending();

        for _ in 0..50 {
            let (priority, _) = forwarder.poll_once().unwrap();
            assert_eq!(priority, Priority::High);
        }
        assert_eq!(ctx.lanes[Priority::Medium].len(), 1);
        assert_eq!(ctx.lanes[Priority::Low].len(), 1);
        assert_eq!(forwarder.poll_once().unwrap().0, Priority::Medium);
        assert_eq!(forwarder.poll_once().unwrap().0, Priority::Low);
    }

    #[test]
    fn test_address_examples_route_as_documented() {
        let ctx = RouterContext::new(fast_config(), Arc::new(NullSink)).unwrap();
        let dispatcher = Dispatcher::new(ctx.clone());
        let expected = [
            (0x2000_0000, Route::Port(0)),
            (0x5000_0000, Route::Port(1)),
            (0x9000_0000, Route::Port(2)),
            (0xE000_0000, Route::Broadcast),
        ];
        for (destination, route) in expected {
            ctx.counters.record_created();
            let outcome = dispatcher.dispatch(packet(0x0100_0000, destination, PacketKind::Other));
            assert_eq!(outcome.route, route);
        }
        let lens: Vec<usize> = ctx.ports.iter().map(|port| port.len()).collect();
        assert_eq!(lens, vec![2, 2, 2]);

        let classifier = Classifier::new(ctx.clone());
        ctx.counters.record_created();
        ctx.counters.record_created();
        let now = std::time::Instant::now();
        assert!(classifier
            .process(packet(0x1200_0000, 0x2000_0000, PacketKind::Video), now)
            .is_err());
        assert!(classifier
            .process(packet(0x0100_0000, 0x2000_0000, PacketKind::Video), now)
            .is_ok());
    }

    #[test]
    fn test_broadcast_with_one_full_port() {
        let mut config = fast_config();
        config.queues.port = 2;
        let ctx = RouterContext::new(config, Arc::new(NullSink)).unwrap();
        let dispatcher = Dispatcher::new(ctx.clone());
        for _ in 0..2 {
            ctx.counters.record_created();
            ctx.ports[2]
                .push(packet(0x0100_0000, 0x9000_0000, PacketKind::Audio))
                .unwrap();
        }
        ctx.counters.record_created();
        let outcome = dispatcher.dispatch(packet(0x0100_0000, 0xC000_0001, PacketKind::Audio));
        assert_eq!((outcome.delivered, outcome.dropped), (2, 1));
        assert_eq!(ctx.ports[0].len(), 1);
        assert_eq!(ctx.ports[1].len(), 1);
        assert_eq!(ctx.counters.snapshot().rejected_output_full, 1);
    }

    #[test]
    fn test_pause_resume_leaves_counters_unchanged() {
        let ctx = RouterContext::new(fast_config(), Arc::new(NullSink)).unwrap();
        let mut generator = Generator::new(ctx.clone());
        generator.run_burst();
        Classifier::new(ctx.clone()).process_pending();
        let before = ctx.counters.snapshot();
        ctx.control.pause_all();
        ctx.control.resume_all();
        assert_eq!(ctx.counters.snapshot(), before);
    }
}
