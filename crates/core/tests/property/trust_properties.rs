use proptest::prelude::*;
use toolmesh_core::trust::TrustCalculator;
use toolmesh_core::types::TrustMetrics;

fn metrics_strategy() -> impl Strategy<Value = TrustMetrics> {
    (
        0.0f64..=100.0,
        0.0f64..5_000.0,
        0.0f64..=100.0,
        0u64..1_000_000,
        0u64..100_000,
        0.0f64..=100.0,
        0u32..50,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(uptime, latency, success, requests, probes, quality, reports, verified, audited)| {
                TrustMetrics {
                    uptime,
                    avg_response_time_ms: latency,
                    success_rate: success,
                    total_requests: requests,
                    total_errors: 0,
                    successful_probes: probes,
                    quality_score: quality,
                    report_count: reports,
                    verified_owner: verified,
                    audited_code: audited,
                }
            },
        )
}

proptest! {
    #[test]
    fn score_is_always_in_range(metrics in metrics_strategy()) {
        let score = TrustCalculator::calculate(&metrics);
        prop_assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn dominating_metrics_never_score_lower(
        metrics in metrics_strategy(),
        d_uptime in 0.0f64..20.0,
        d_latency in 0.0f64..200.0,
        d_success in 0.0f64..20.0,
        d_requests in 0u64..10_000,
        d_quality in 0.0f64..20.0,
    ) {
        let better = TrustMetrics {
            uptime: (metrics.uptime + d_uptime).min(100.0),
            avg_response_time_ms: (metrics.avg_response_time_ms - d_latency).max(0.0),
            success_rate: (metrics.success_rate + d_success).min(100.0),
            total_requests: metrics.total_requests + d_requests,
            successful_probes: metrics.successful_probes + d_requests,
            quality_score: (metrics.quality_score + d_quality).min(100.0),
            report_count: metrics.report_count.saturating_sub(1),
            verified_owner: true,
            audited_code: true,
            ..metrics.clone()
        };
        prop_assert!(TrustCalculator::calculate(&better) >= TrustCalculator::calculate(&metrics));
    }

    #[test]
    fn an_extra_report_lowers_a_positive_score(metrics in metrics_strategy()) {
        let before = TrustCalculator::calculate(&metrics);
        let reported = TrustMetrics {
            report_count: metrics.report_count + 1,
            ..metrics.clone()
        };
        let after = TrustCalculator::calculate(&reported);
        if before > 0.0 {
            prop_assert!(after < before);
        } else {
            prop_assert_eq!(after, 0.0);
        }
    }

    #[test]
    fn decay_is_strictly_decreasing_in_days(
        score in 0.1f64..=100.0,
        d1 in 0.0f64..100.0,
        gap in 0.01f64..100.0,
        rate in 0.5f64..0.999,
    ) {
        let earlier = TrustCalculator::apply_decay(score, d1, rate);
        let later = TrustCalculator::apply_decay(score, d1 + gap, rate);
        prop_assert!(later < earlier);
        prop_assert_eq!(TrustCalculator::apply_decay(score, 0.0, rate), score);
    }
}
