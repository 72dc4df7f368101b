// Property tests over randomly generated portfolios and coefficient tables.

use eco_risk_network::analysis::cascade::{self, CascadeState};
use eco_risk_network::analysis::centrality::weighted_degrees;
use eco_risk_network::{
    ActivityId, Bank, BankId, DependencyEngine, EngineConfig, ExposureMatrix, FootprintEstimator, HazardId,
    IntensityTable, Matrix, NetworkBuilder, ReferenceData, RiskPipeline, ServiceId, SupplyChain,
};
use proptest::prelude::*;

const ACTIVITIES: [&str; 3] = ["agriculture", "construction", "mining"];
const SERVICES: [&str; 2] = ["pollination", "water"];
const HAZARDS: [&str; 2] = ["drought", "floods"];

fn exposure(amounts: &[Vec<f64>]) -> ExposureMatrix {
    let banks = amounts
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut row = row.clone();
            row[0] += 0.5;
            let amounts = ACTIVITIES.iter().zip(row).map(|(a, v)| (ActivityId::from(*a), v)).collect();
            Bank::from_amounts(format!("bank{:02}", i), amounts).unwrap()
        })
        .collect();
    ExposureMatrix::new(banks).unwrap()
}

fn coefficients<C: From<String> + Ord + Clone + std::fmt::Display>(
    cols: &[&str],
    values: &[f64],
) -> Matrix<ActivityId, C> {
    Matrix::from_rows(
        "coefficients",
        ACTIVITIES.iter().enumerate().map(|(i, a)| {
            let cells: Vec<(C, f64)> = cols
                .iter()
                .enumerate()
                .map(|(j, c)| (C::from(c.to_string()), values[i * cols.len() + j]))
                .collect();
            (ActivityId::from(*a), cells)
        }),
    )
    .unwrap()
}

fn intensity(values: &[f64]) -> IntensityTable {
    IntensityTable::new("intensity", ACTIVITIES.iter().zip(values).map(|(a, v)| (ActivityId::from(*a), *v))).unwrap()
}

fn reference(dep: &[f64], haz: &[f64], ghg: &[f64], land: &[f64]) -> ReferenceData {
    ReferenceData {
        service_dependency: coefficients::<ServiceId>(&SERVICES, dep),
        hazard_sensitivity: coefficients::<HazardId>(&HAZARDS, haz),
        emissions: intensity(ghg),
        land_use: intensity(land),
        cooccurrence: None,
        supply_chain: None,
    }
}

prop_compose! {
    fn portfolios()(n in 1usize..7)
        (amounts in prop::collection::vec(prop::collection::vec(0.0f64..10.0, 3), n))
        -> Vec<Vec<f64>> {
        amounts
    }
}

prop_compose! {
    fn unit_table(len: usize)(values in prop::collection::vec(0.0f64..=1.0, len)) -> Vec<f64> {
        values
    }
}

proptest! {
    #[test]
    fn loan_amounts_normalize_to_unit_weights(amounts in portfolios()) {
        let exposure = exposure(&amounts);
        for bank in exposure.banks() {
            prop_assert!((bank.weight_sum() - 1.0).abs() <= 1e-6);
            prop_assert!(bank.portfolio_value > 0.0);
        }
    }

    #[test]
    fn off_by_more_than_tolerance_is_rejected(w in 0.0f64..0.9, drift in 1e-4f64..0.1) {
        let weights = vec![(ActivityId::from("a"), w), (ActivityId::from("b"), 1.0 - w + drift)];
        prop_assert!(Bank::new(BankId::from("x"), 1.0, weights).is_err());
    }

    #[test]
    fn dependency_scores_stay_in_unit_interval(
        amounts in portfolios(),
        dep in unit_table(6),
        leontief in prop::collection::vec(0.0f64..3.0, 9),
    ) {
        let exposure = exposure(&amounts);
        let coefficients = coefficients::<ServiceId>(&SERVICES, &dep);

        let direct = DependencyEngine::new().assess(&exposure, &coefficients).unwrap();
        for (_, _, v) in direct.entries() {
            prop_assert!((0.0..=1.0).contains(&v));
        }

        let chain = SupplyChain::new(coefficients_square(&leontief)).unwrap();
        let upstream = DependencyEngine::with_supply_chain(&chain).assess(&exposure, &coefficients).unwrap();
        for ((_, _, d), (_, _, u)) in direct.entries().zip(upstream.entries()) {
            prop_assert!((0.0..=1.0).contains(&u));
            prop_assert!(u + 1e-12 >= d);
        }
    }

    #[test]
    fn footprint_is_non_negative(
        amounts in portfolios(),
        ghg in prop::collection::vec(0.0f64..100.0, 3),
        land in prop::collection::vec(0.0f64..100.0, 3),
    ) {
        let table = FootprintEstimator::new()
            .estimate(&exposure(&amounts), &intensity(&ghg), &intensity(&land))
            .unwrap();
        for score in table.iter() {
            prop_assert!(score.total >= 0.0);
            prop_assert!((score.total - score.emissions_component - score.land_use_component).abs() < 1e-9);
        }
    }

    #[test]
    fn network_rebuild_is_identical(
        amounts in portfolios(),
        dep in unit_table(6),
        haz in unit_table(6),
    ) {
        let exposure = exposure(&amounts);
        let reference = reference(&dep, &haz, &[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]);
        let dependency = DependencyEngine::new().assess(&exposure, &reference.service_dependency).unwrap();
        let hazard = eco_risk_network::assess_hazard_exposure(&exposure, &reference.hazard_sensitivity).unwrap();
        let footprint = FootprintEstimator::new()
            .estimate(&exposure, &reference.emissions, &reference.land_use)
            .unwrap();

        let builder = NetworkBuilder::new().derive_cooccurrence(true);
        let first = builder.build(&dependency, &hazard, &footprint).unwrap();
        let second = builder.build(&dependency, &hazard, &footprint).unwrap();
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first.bank_count(), exposure.len());
        for edge in first.edges() {
            prop_assert!(edge.weight > 0.0 && edge.weight.is_finite());
            prop_assert!(edge.source < edge.target);
        }
    }

    #[test]
    fn cascade_is_monotonic_and_skips_isolated_banks(
        amounts in portfolios(),
        dep in unit_table(6),
        haz in unit_table(6),
        phi in 0.0f64..0.5,
        percentile in 0.0f64..=100.0,
    ) {
        let exposure = exposure(&amounts);
        let reference = reference(&dep, &haz, &[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]);
        let mut config = EngineConfig::new(phi);
        config.severity_threshold = eco_risk_network::SeverityThreshold::Percentile(percentile);
        let report = RiskPipeline::new(config.clone()).unwrap().run(&exposure, &reference).unwrap();

        let network = &report.network;
        let propagation = &report.analysis.propagation;
        for i in network.bank_indices() {
            if network.is_isolated(i) {
                let bank = network.key(i).as_bank().unwrap();
                prop_assert_eq!(propagation.stress_round(bank), None);
            }
        }
        for k in 0..propagation.rounds_executed {
            let before = propagation.stressed_after(k);
            let after = propagation.stressed_after(k + 1);
            prop_assert!(before.iter().all(|b| after.contains(b)));
        }
        prop_assert!(propagation.converged != propagation.hit_round_cap);
        prop_assert!((0.0..=1.0).contains(&propagation.stressed_fraction));

        let degrees = weighted_degrees(network);
        let state = CascadeState::initial(network, &degrees, propagation.severity_threshold);
        let next = cascade::step(&state, network, phi);
        for i in state.stressed() {
            prop_assert!(next.state.is_stressed(i));
        }
    }
}

fn coefficients_square(values: &[f64]) -> Matrix<ActivityId, ActivityId> {
    Matrix::from_rows(
        "leontief",
        ACTIVITIES.iter().enumerate().map(|(i, a)| {
            let cells: Vec<(ActivityId, f64)> = ACTIVITIES
                .iter()
                .enumerate()
                .map(|(j, b)| (ActivityId::from(*b), values[i * 3 + j]))
                .collect();
            (ActivityId::from(*a), cells)
        }),
    )
    .unwrap()
}
