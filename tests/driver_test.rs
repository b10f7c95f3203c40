//! End-to-end experiment driver tests on the CPU backend

use pcbench::backend::{CpuBackend, DeviceContext};
use pcbench::circuit::{HcltParams, RatParams};
use pcbench::config::BenchConfig;
use pcbench::dataset::{synthetic, PreparedData};
use pcbench::experiment::{
    ExperimentDriver, ModelFamily, ModelParams, Sweep, SweepAxis, SweepPlan,
};
use pcbench::trial::DiagnosticProbe;

fn config() -> BenchConfig {
    BenchConfig::builder()
        .budget_secs(0.01)
        .batch_size(4)
        .threads(2)
        .build()
        .unwrap()
}

fn hclt_plan(latents: Vec<usize>) -> SweepPlan {
    SweepPlan::new(
        ModelParams::Hclt(HcltParams::default()),
        vec![Sweep::new(SweepAxis::Latents, latents)],
    )
    .unwrap()
}

#[test]
fn test_hclt_end_to_end() {
    let config = config();
    let data = PreparedData::prepare(synthetic(8, 12, 42), config.prepare_options()).unwrap();
    let backend = CpuBackend::new(DeviceContext::new(0), config.threads).unwrap();
    let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config);

    let report = driver.run_plan(&hclt_plan(vec![2, 4]), &data).unwrap();
    assert_eq!(report.axes().collect::<Vec<_>>(), vec!["latents"]);

    let records = report.records("latents").unwrap();
    assert_eq!(records.len(), 2);
    for (record, latents) in records.iter().zip([2, 4]) {
        let ModelParams::Hclt(params) = record.hparams().params else {
            panic!("expected HCLT hparams");
        };
        assert_eq!(params.latents, latents);
        assert_eq!(record.hparams().batch_size, 4);

        let stats = record.stats().unwrap();
        assert_eq!(stats.num_inputs, 12 * latents as u64);

        let results = record.results().unwrap();
        assert!(results.evi.num_samples >= 1);
        assert!(results.evi.median_time > 0.0);
        assert!(results.evi.median_gctime >= 0.0);
        assert!(results.evi.cuda_alloc_memory > 0);
        // HCLT runs EVI only by default
        assert!(results.map.is_none());
    }

    let stats: Vec<_> = records.iter().map(|r| r.stats().unwrap().num_params).collect();
    assert!(stats[1] > stats[0]);
}

#[test]
fn test_report_file_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    let data = PreparedData::prepare(synthetic(8, 12, 42), config.prepare_options()).unwrap();
    let backend = CpuBackend::new(DeviceContext::new(0), Some(1)).unwrap();
    let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config);

    let report = driver.run_plan(&hclt_plan(vec![2]), &data).unwrap();
    let path = report.write(dir.path(), "pcs-jl").unwrap();
    assert!(path.ends_with("pcs-jl-HCLT-trials.json"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let record = &json["latents"][0];
    assert_eq!(record["hparams"]["latents"], 2);
    assert_eq!(record["hparams"]["batch_size"], 4);
    assert!(record["stats"]["num_params"].as_u64().unwrap() > 0);
    assert!(record["results"]["evi"]["median_time"].as_f64().unwrap() > 0.0);
    assert!(record.get("error").is_none());
}

#[test]
fn test_rat_runs_map() {
    let config = config();
    let data = PreparedData::prepare(synthetic(6, 8, 1), config.prepare_options()).unwrap();
    let backend = CpuBackend::new(DeviceContext::new(0), Some(1)).unwrap();
    let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config);

    let base = RatParams {
        num_nodes_region: 2,
        num_nodes_leaf: 2,
        rg_depth: 2,
        rg_replicas: 2,
    };
    let plan = SweepPlan::new(
        ModelParams::Rat(base),
        vec![
            Sweep::new(SweepAxis::NumSumRegion, vec![2, 3]),
            Sweep::new(SweepAxis::RgReplicas, vec![1]),
        ],
    )
    .unwrap();

    let report = driver.run_plan(&plan, &data).unwrap();
    assert_eq!(report.family(), ModelFamily::Rat);
    assert_eq!(
        report.axes().collect::<Vec<_>>(),
        vec!["num_sum_region", "rg_replicas"]
    );
    assert_eq!(report.len(), 3);
    for record in report.records("num_sum_region").unwrap() {
        let results = record.results().unwrap();
        let map = results.map.unwrap();
        assert!(map.num_samples >= 1);
        assert!(map.cuda_alloc_memory > 0);
    }
}

#[test]
fn test_map_hclt_capability() {
    let config = BenchConfig::builder()
        .budget_secs(0.0)
        .batch_size(8)
        .map_family(ModelFamily::Hclt)
        .build()
        .unwrap();
    let data = PreparedData::prepare(synthetic(8, 6, 5), config.prepare_options()).unwrap();
    let backend = CpuBackend::new(DeviceContext::new(0), Some(1)).unwrap();
    let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config);

    let report = driver.run_plan(&hclt_plan(vec![2]), &data).unwrap();
    let record = &report.records("latents").unwrap()[0];
    assert!(record.results().unwrap().map.is_some());
}

#[test]
fn test_same_point_same_stats_regardless_of_order() {
    let config = config();
    let data = PreparedData::prepare(synthetic(8, 12, 42), config.prepare_options()).unwrap();
    let backend = CpuBackend::new(DeviceContext::new(0), Some(1)).unwrap();
    let mut driver = ExperimentDriver::new(&backend, DiagnosticProbe::new(), config);

    let forward = driver.run_plan(&hclt_plan(vec![2, 4]), &data).unwrap();
    let backward = driver.run_plan(&hclt_plan(vec![4, 2]), &data).unwrap();
    let f = forward.records("latents").unwrap();
    let b = backward.records("latents").unwrap();
    assert_eq!(f[0].stats(), b[1].stats());
    assert_eq!(f[1].stats(), b[0].stats());
}
