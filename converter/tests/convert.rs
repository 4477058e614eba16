//! End-to-end conversion of CSV files.

use std::fs;

use table_converter::{convert_file, load_config, read_csv_file, Config, ConvertError, ConvertOptions};
use tempfile::TempDir;

const INPUT: &str = "\
Titre;Artiste;Pays;Tags;Statut
Blue Song;Ana;FR;pop, jazz;active
Red Song;Bo;DE;rock;active
Green Song;Ana;FR;;draft
Blue Song;Ana;DE;pop;active
";

const CONFIG: &str = r#"{
  "actions": [
    "assign:title=Titre:required",
    "split:tags=Tags:delimiter=,",
    "join:tag_list=tags:delimiter=|"
  ],
  "process": {
    "filter": [{"field": "Statut", "operator": "==", "value": "active"}],
    "assign_ids": {
      "artist_id": {"primary": "Artiste", "context": "Pays"}
    },
    "assign_constants": {"source": "catalog"},
    "assign_formats": {"code": "{source}-{Pays}-{artist_id:03}"}
  },
  "map": {
    "work": {"title": "title", "tags": "tag_list"},
    "artist": {"id": "artist_id", "code": "code"}
  }
}"#;

fn setup(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let input = dir.path().join("input.csv");
    let config = dir.path().join("config.json");
    fs::write(&input, INPUT).unwrap();
    fs::write(&config, CONFIG).unwrap();
    (input, config)
}

#[test]
fn test_convert_with_config_file() {
    let dir = TempDir::new().unwrap();
    let (input, config_path) = setup(&dir);
    let output = dir.path().join("output.csv");

    let config = load_config(&config_path).unwrap();
    let summary = convert_file(config, &input, Some(&output), &ConvertOptions::default()).unwrap();

    assert_eq!(summary.input.delimiter, ';');
    assert_eq!(summary.input.row_count, 4);
    assert_eq!(summary.written, 3);
    assert_eq!(summary.dropped, 1);

    let written = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "work.title,work.tags,artist.id,artist.code");
    assert_eq!(lines[1], "Blue Song,pop|jazz,0,catalog-FR-000");
    assert_eq!(lines[2], "Red Song,rock,0,catalog-DE-000");
    assert_eq!(lines[3], "Blue Song,pop,1,catalog-DE-001");
}

#[test]
fn test_convert_default_picks_and_staging() {
    let dir = TempDir::new().unwrap();
    let (input, _) = setup(&dir);
    let output = dir.path().join("output.csv");

    let mut config = Config::new();
    config.add_actions(&["filter:Statut!=draft", "assign:first_tag=Tags"], ':').unwrap();
    let options = ConvertOptions {
        output_delimiter: ';',
        keep_staging: true,
        ..Default::default()
    };
    convert_file(config, &input, Some(&output), &options).unwrap();

    let table = read_csv_file(&output, Some(';')).unwrap();
    assert_eq!(table.records.len(), 3);
    assert_eq!(&table.headers[..5], &["Titre", "Artiste", "Pays", "Tags", "Statut"]);
    assert!(table.headers.contains(&"_staging.input.Titre".to_string()));
    assert!(table.headers.contains(&"_staging.first_tag".to_string()));
    assert_eq!(table.records[0]["_staging.first_tag"], "pop, jazz");
}

#[test]
fn test_convert_reports_failing_record() {
    let dir = TempDir::new().unwrap();
    let (input, _) = setup(&dir);

    let mut config = Config::new();
    config.add_actions(&["assign:tags=Tags:required"], ':').unwrap();
    let err = convert_file(config, &input, Some(&dir.path().join("out.csv")), &ConvertOptions::default())
        .unwrap_err();

    match err {
        ConvertError::Action { record, .. } => assert_eq!(record, 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_accented_input_and_format() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("accents.csv");
    let output = dir.path().join("out.csv");
    fs::write(&input, "Nom,Ville\nZoé,Orléans\nÉric,\n").unwrap();

    let mut config = Config::new();
    config
        .add_actions(&["assign-format:label={Nom} ({Ville})", "assign-format:missing={Pays}"], ':')
        .unwrap();
    config.picks = vec![
        table_converter::PickConfig::new("label", "label"),
        table_converter::PickConfig::new("missing", "missing"),
    ];
    convert_file(config, &input, Some(&output), &ConvertOptions::default()).unwrap();

    let written = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines, vec!["label,missing", "Zoé (Orléans),__Pays__undefined__", "Éric (),__Pays__undefined__"]);
}
