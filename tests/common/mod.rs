//! Common test helpers and fixtures shared across the integration suite.

use sierra_marc::sierra::{BibRecord, ControlFieldRow, LeaderFieldRow, VarFieldRow};

/// Creates a varfield row with blank indicators.
#[allow(dead_code)]
pub fn varfield(type_code: char, tag: &str, occ_num: u32, content: &str) -> VarFieldRow {
    VarFieldRow {
        varfield_type_code: type_code,
        marc_tag: Some(tag.to_string()),
        marc_ind1: ' ',
        marc_ind2: ' ',
        occ_num,
        field_content: content.to_string(),
    }
}

/// Creates a leader-field row for a language-material monograph.
#[allow(dead_code)]
pub fn book_leader() -> LeaderFieldRow {
    LeaderFieldRow {
        record_status_code: 'n',
        record_type_code: 'a',
        bib_level_code: 'm',
        control_type_code: ' ',
        char_encoding_scheme_code: 'a',
        encoding_level_code: ' ',
        descriptive_cat_form_code: 'i',
        multipart_level_code: ' ',
    }
}

/// Creates a minimal bib record with a leader, an 001 and a title.
#[allow(dead_code)]
pub fn titled_bib(record_num: &str, title: &str) -> BibRecord {
    let mut bib = BibRecord::new(record_num);
    bib.leader = Some(book_leader());
    bib.control_fields.push(ControlFieldRow {
        control_num: 1,
        data: format!("ocm{}", record_num.trim_start_matches('b')),
    });
    let mut title_field = varfield('t', "245", 0, &format!("|a{title}"));
    title_field.marc_ind1 = '1';
    title_field.marc_ind2 = '0';
    bib.varfields.push(title_field);
    bib
}

/// The varfield layout catalogers see in Sierra, stored out of order.
///
/// In display order the `$a` values run `1` through `9`: two `y` 036
/// fields, the `a` 100, the `n` notes by occurrence (520, 520, 500, 530)
/// and two `y` 856 fields.
#[allow(dead_code)]
pub fn field_order_bib() -> BibRecord {
    let mut bib = titled_bib("b1000001", "Field order");
    bib.varfields = vec![
        varfield('y', "856", 3, "|a9"),
        varfield('n', "530", 3, "|a7"),
        varfield('n', "500", 2, "|a6"),
        varfield('y', "036", 1, "|a2"),
        varfield('n', "520", 1, "|a5"),
        varfield('a', "100", 0, "|a3"),
        varfield('y', "856", 2, "|a8"),
        varfield('n', "520", 0, "|a4"),
        varfield('y', "036", 0, "|a1"),
    ];
    bib
}

/// A Django-style fixture with two bibs, one of them deleted.
#[allow(dead_code)]
pub const BIB_FIXTURE: &str = r#"[
    {"model": "base.bibrecord", "pk": 1, "fields": {"record_num": "b1000001"}},
    {"model": "base.bibrecord", "pk": 2, "fields": {"record_num": "b1000002"}},
    {"model": "base.bibrecord", "pk": 3, "fields": {"record_num": "b1000003", "deleted": true}},
    {"model": "base.leaderfield", "pk": 1, "fields": {
        "record": 1, "record_status_code": "c", "record_type_code": "a",
        "bib_level_code": "m", "control_type_code": " ",
        "char_encoding_scheme_code": "a", "encoding_level_code": "I",
        "descriptive_cat_form_code": "i", "multipart_level_code": " "}},
    {"model": "base.controlfield", "pk": 1, "fields": {
        "record": 1, "control_num": 1, "data": "ocm00000001"}},
    {"model": "base.varfield", "pk": 1, "fields": {
        "record": 1, "varfield_type_code": "t", "marc_tag": "245",
        "marc_ind1": "1", "marc_ind2": "4", "occ_num": 0,
        "field_content": "|aThe first record /|cby A. Author."}},
    {"model": "base.varfield", "pk": 2, "fields": {
        "record": 1, "varfield_type_code": "c", "marc_tag": "050",
        "marc_ind1": " ", "marc_ind2": "4", "occ_num": 0,
        "field_content": "|aQA76.73.R87|bK57 2019"}},
    {"model": "base.varfield", "pk": 3, "fields": {
        "record": 2, "varfield_type_code": "t", "marc_tag": "245",
        "marc_ind1": "0", "marc_ind2": "0", "occ_num": 0,
        "field_content": "Second record."}},
    {"model": "base.varfield", "pk": 4, "fields": {
        "record": 2, "varfield_type_code": "_", "marc_tag": null,
        "marc_ind1": " ", "marc_ind2": " ", "occ_num": 0,
        "field_content": "Staff note, not MARC"}}
]"#;
