//! Built-in MovieLens / hetrec pipelines.
//!
//! MovieLens files (`movies.dat`, `ratings.dat`, `tags.dat`) are `::`
//! delimited with no header. The hetrec `movie-details` set is tab
//! delimited, carries a header row in every file, and joins `movies.dat`
//! against six per-movie attribute files sorted by movie id.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::{json, Value};
use tracing::info;

use lensdex_core::{Delimiter, DocumentSchema, FieldKind, FieldSpec, IndexerConfig, Record};
use lensdex_io::{load_side_map, JoinedRecords, MultiFileJoinReader, SideMap};
use lensdex_operators::document::encode_list;
use lensdex_operators::GroupLayout;

use crate::error::ExecError;
use crate::pipeline::{OutputTarget, PipelineOrchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Movies,
    Ratings,
    Tags,
    UserRatings,
    MovieDetails,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::Movies,
        Dataset::Ratings,
        Dataset::Tags,
        Dataset::UserRatings,
        Dataset::MovieDetails,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dataset::Movies => "movies",
            Dataset::Ratings => "ratings",
            Dataset::Tags => "tags",
            Dataset::UserRatings => "user-ratings",
            Dataset::MovieDetails => "movie-details",
        }
    }

    /// File read as the primary stream, relative to the data directory.
    pub fn primary_file(self) -> &'static str {
        match self {
            Dataset::Movies | Dataset::MovieDetails => "movies.dat",
            Dataset::Ratings | Dataset::UserRatings => "ratings.dat",
            Dataset::Tags => "tags.dat",
        }
    }

    pub fn delimiter(self) -> Delimiter {
        match self {
            Dataset::MovieDetails => Delimiter::Tab,
            _ => Delimiter::DoubleColon,
        }
    }

    pub fn schema(self) -> DocumentSchema {
        match self {
            Dataset::Movies => DocumentSchema::positional([
                ("MovieID", FieldKind::String),
                ("Title", FieldKind::String),
                ("Genres", FieldKind::list("|")),
            ]),
            Dataset::Ratings | Dataset::UserRatings => DocumentSchema::positional([
                ("UserID", FieldKind::String),
                ("MovieID", FieldKind::String),
                ("Rating", FieldKind::String),
                ("Timestamp", FieldKind::timestamp(1000)),
            ]),
            Dataset::Tags => DocumentSchema::positional([
                ("UserID", FieldKind::String),
                ("MovieID", FieldKind::String),
                ("Tag", FieldKind::String),
                ("Timestamp", FieldKind::timestamp(1000)),
            ]),
            Dataset::MovieDetails => DocumentSchema::new(vec![
                FieldSpec::new("title", 1, FieldKind::String),
                FieldSpec::new("year", 5, FieldKind::String),
            ]),
        }
    }

    pub fn main_output(self) -> OutputTarget {
        match self {
            Dataset::Movies => OutputTarget::new("movies", "movie")
                .with_id_column(0)
                .with_mapping(movies_mapping()),
            Dataset::Ratings | Dataset::UserRatings => {
                OutputTarget::new("ratings", "rating").with_mapping(ratings_mapping())
            }
            Dataset::Tags => OutputTarget::new("tags", "tag").with_mapping(tags_mapping()),
            Dataset::MovieDetails => OutputTarget::new("movie_details", "movie_detail")
                .with_id_column(0)
                .with_mapping(movie_details_mapping()),
        }
    }

    /// Aggregate output, when the dataset has one.
    pub fn group_output(self) -> Option<(OutputTarget, GroupLayout)> {
        match self {
            Dataset::UserRatings => Some((
                OutputTarget::new("user_ratings", "user_ratings").with_mapping(json!({
                    "properties": {
                        "UserID": not_analyzed(),
                        "ratings": { "type": "nested" }
                    }
                })),
                GroupLayout::new("UserID", "ratings"),
            )),
            _ => None,
        }
    }

    pub fn outputs(self) -> Vec<OutputTarget> {
        let mut out = vec![self.main_output()];
        out.extend(self.group_output().map(|(t, _)| t));
        out
    }

    /// Assemble the pipeline over the files in `datadir`. Auxiliary files
    /// are opened here, so a missing one fails before anything is written.
    pub fn orchestrator(
        self,
        datadir: &Path,
        cfg: IndexerConfig,
    ) -> Result<PipelineOrchestrator, ExecError> {
        let primary = datadir.join(self.primary_file());
        let pipeline = PipelineOrchestrator::new(primary, self.schema(), self.delimiter(), cfg)?
            .key_column(0)
            .main_output(self.main_output());

        match self {
            Dataset::UserRatings => {
                let (target, layout) = self
                    .group_output()
                    .ok_or_else(|| lensdex_core::Error::Invariant("user-ratings has no group output".into()))?;
                pipeline.group_output(target, 0, layout, None)
            }
            Dataset::MovieDetails => {
                let tag_names = load_side_map(datadir.join("tags.dat"), &Delimiter::Tab, 0, 1)?;
                info!(
                    tags = tag_names.len(),
                    skipped = tag_names.skipped.len().saturating_sub(1),
                    "tag names loaded"
                );
                let joins = MultiFileJoinReader::open(
                    [
                        ("actors", datadir.join("movie_actors.dat")),
                        ("countries", datadir.join("movie_countries.dat")),
                        ("directors", datadir.join("movie_directors.dat")),
                        ("genres", datadir.join("movie_genres.dat")),
                        ("locations", datadir.join("movie_locations.dat")),
                        ("tags", datadir.join("movie_tags.dat")),
                    ],
                    Delimiter::Tab,
                )?;
                Ok(pipeline
                    .with_joins(joins)
                    .with_augment(move |_, joined| movie_details(joined, &tag_names)))
            }
            _ => Ok(pipeline),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = lensdex_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Dataset::ALL.iter().map(|d| d.name()).collect();
                lensdex_core::Error::Config(format!(
                    "unknown dataset '{s}' (known: {})",
                    known.join(", ")
                ))
            })
    }
}

fn quoted(s: &str) -> String {
    Value::from(s).to_string()
}

/// Joined members of one hetrec movie document.
fn movie_details(joined: &JoinedRecords, tag_names: &SideMap) -> String {
    let first_field = |rel: &str, col: usize| {
        joined
            .first(rel)
            .and_then(|r| r.field(col))
            .map(quoted)
            .unwrap_or_else(|| quoted(""))
    };
    let locations: Vec<String> = joined
        .get("locations")
        .iter()
        .map(|r: &Record| {
            r.fields()
                .iter()
                .skip(1)
                .take(4)
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let tags = joined
        .get("tags")
        .iter()
        .filter_map(|r| r.key_at(1).and_then(|id| tag_names.get(id)));

    format!(
        "\"country\":{},\"director\":{},\"actors\":{},\"genres\":{},\"locations\":{},\"tags\":{}",
        first_field("countries", 1),
        first_field("directors", 2),
        encode_list(joined.column("actors", 2)),
        encode_list(joined.column("genres", 1)),
        encode_list(locations.iter().map(String::as_str)),
        encode_list(tags),
    )
}

fn analyzed() -> Value {
    json!({ "type": "string", "index": "analyzed", "store": "yes", "boost": 1.0, "term_vector": "no" })
}

fn not_analyzed() -> Value {
    json!({ "type": "string", "index": "not_analyzed", "store": "yes", "boost": 1.0, "term_vector": "no" })
}

fn movies_mapping() -> Value {
    json!({ "properties": { "Title": analyzed(), "Genres": not_analyzed() } })
}

fn ratings_mapping() -> Value {
    json!({
        "properties": {
            "UserID": not_analyzed(),
            "MovieID": not_analyzed(),
            "Rating": not_analyzed(),
            "Timestamp": { "type": "date" }
        }
    })
}

fn tags_mapping() -> Value {
    json!({
        "properties": {
            "UserID": not_analyzed(),
            "MovieID": not_analyzed(),
            "Tag": analyzed(),
            "Timestamp": { "type": "date" }
        }
    })
}

fn movie_details_mapping() -> Value {
    json!({
        "properties": {
            "title": analyzed(),
            "year": not_analyzed(),
            "country": not_analyzed(),
            "director": not_analyzed(),
            "actors": not_analyzed(),
            "genres": not_analyzed(),
            "locations": analyzed(),
            "tags": analyzed()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for d in Dataset::ALL {
            assert_eq!(d.name().parse::<Dataset>().unwrap(), d);
        }
        assert!("movielens".parse::<Dataset>().is_err());
    }

    #[test]
    fn only_user_ratings_groups() {
        let grouped: Vec<_> = Dataset::ALL
            .into_iter()
            .filter(|d| d.group_output().is_some())
            .collect();
        assert_eq!(grouped, vec![Dataset::UserRatings]);
        assert_eq!(Dataset::UserRatings.outputs().len(), 2);
    }

    #[test]
    fn movie_details_members_follow_join_results() {
        let mut joined = JoinedRecords::default();
        joined.insert("countries", vec![Record::from_fields(["1", "USA"])]);
        joined.insert(
            "actors",
            vec![
                Record::from_fields(["1", "tom_hanks", "Tom Hanks", "1"]),
                Record::from_fields(["1", "tim_allen", "Tim Allen", "2"]),
            ],
        );
        joined.insert(
            "locations",
            vec![Record::from_fields(["1", "USA", "California", "", ""])],
        );
        joined.insert(
            "tags",
            vec![Record::from_fields(["1", "7", "1"]), Record::from_fields(["1", "99", "1"])],
        );
        let tag_names: SideMap = [(7, "pixar".to_string())].into_iter().collect();

        let body = format!("{{{}}}", movie_details(&joined, &tag_names));
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["country"], json!("USA"));
        assert_eq!(v["director"], json!(""));
        assert_eq!(v["actors"], json!(["Tom Hanks", "Tim Allen"]));
        assert_eq!(v["genres"], json!([]));
        assert_eq!(v["locations"], json!(["USA California"]));
        assert_eq!(v["tags"], json!(["pixar"]));
    }

    #[test]
    fn missing_auxiliary_file_fails_assembly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tags.dat"), "id\tvalue\n1\tfunny\n").unwrap();
        let err = Dataset::MovieDetails
            .orchestrator(dir.path(), IndexerConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ExecError::Io(_)));
    }
}
