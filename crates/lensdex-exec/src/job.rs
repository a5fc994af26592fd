//! YAML job → `PipelineOrchestrator`.

use lensdex_core::dsl::yaml::{GroupDef, JobSpec};
use lensdex_core::IndexerConfig;
use lensdex_operators::GroupLayout;

use crate::error::ExecError;
use crate::pipeline::{OutputTarget, PipelineOrchestrator};

/// The job's main and group outputs, in write order.
pub fn job_outputs(job: &JobSpec) -> Vec<OutputTarget> {
    let mut out = Vec::new();
    if job.emit_main {
        out.push(main_target(job));
    }
    out.extend(job.group.as_ref().map(group_target));
    out
}

fn group_target(g: &GroupDef) -> OutputTarget {
    OutputTarget {
        index: g.index.clone(),
        doc_type: g.doc_type.clone(),
        id_column: None,
        mapping: g.mapping.clone(),
    }
}

fn main_target(job: &JobSpec) -> OutputTarget {
    OutputTarget {
        index: job.index.clone(),
        doc_type: job.doc_type.clone(),
        id_column: job.id_column,
        mapping: job.mapping.clone(),
    }
}

/// `cfg` should already carry the job's `config:` section and any CLI overrides.
pub fn orchestrator_from_job(
    job: &JobSpec,
    cfg: IndexerConfig,
) -> Result<PipelineOrchestrator, ExecError> {
    job.validate()?;
    let mut pipeline =
        PipelineOrchestrator::new(job.primary.clone(), job.schema(), job.delimiter.clone(), cfg)?
            .key_column(job.key_column);
    if job.emit_main {
        pipeline = pipeline.main_output(main_target(job));
    }
    if let Some(g) = &job.group {
        pipeline = pipeline.group_output(
            group_target(g),
            g.key_column,
            GroupLayout::new(g.key_field.as_str(), g.members_field.as_str()),
            g.flush_threshold,
        )?;
    }
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensdex_core::dsl::yaml::parse_yaml_job;

    const JOB: &str = r#"
primary: ratings.dat
delimiter: double_colon
index: ratings
doc_type: rating
emit_main: false
fields:
  - { name: UserID, column: 0, type: string }
  - { name: MovieID, column: 1, type: string }
group:
  index: user_ratings
  doc_type: user_ratings
  key_field: UserID
  members_field: ratings
"#;

    #[test]
    fn aggregate_only_job_has_one_output() {
        let job = parse_yaml_job(JOB).unwrap();
        let outputs = job_outputs(&job);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].index, "user_ratings");

        let pipeline = orchestrator_from_job(&job, IndexerConfig::default()).unwrap();
        let names: Vec<_> = pipeline.outputs().iter().map(|t| t.index.clone()).collect();
        assert_eq!(names, vec!["user_ratings".to_string()]);
    }

    #[test]
    fn main_output_carries_id_column() {
        let yaml = JOB.replace("emit_main: false", "id_column: 1");
        let job = parse_yaml_job(&yaml).unwrap();
        let outputs = job_outputs(&job);
        assert_eq!(outputs[0].index, "ratings");
        assert_eq!(outputs[0].id_column, Some(1));
    }
}
