//! Reference vocabularies used while parsing and normalizing MARC data.
//!
//! - [`ABBREVIATIONS`]: words whose trailing period is part of the word
//!   (`ed.`, `Dr.`), so period protection leaves it alone
//! - [`PERSON_PRETITLES`]: honorifics, ranks and nobiliary particles that
//!   can precede a personal name (compare lowercased, punctuation removed)
//! - [`NAME_PARTICLES`]: nobiliary particles (`van`, `de`, `of`)
//! - [`RELATOR_CODES`]: MARC relator codes (`$4`) mapped to relator terms

use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::collections::HashSet;

const ABBREVIATION_LIST: &[&str] = &[
    "abr", "acc", "Apr", "arr", "Aug", "augm", "Bd", "Bde", "bk", "bks", "Bros", "ca", "cf",
    "ch", "chap", "Co", "col", "comp", "comps", "Corp", "cm", "Dec", "Dept", "dept", "diss",
    "Dr", "ed", "eds", "Ed", "Eds", "enl", "esp", "etc", "Feb", "fasc", "fig", "figs", "fl",
    "Fr", "Gov", "Govt", "Hon", "ill", "illus", "Inc", "incl", "intro", "Jan", "Jr", "Jul",
    "Jun", "Ltd", "Mar", "ms", "mss", "Mr", "Mrs", "Ms", "Mt", "no", "No", "nos", "Nos", "Nov",
    "Oct", "op", "Op", "p", "pp", "Prof", "pseud", "pt", "pts", "pub", "publ", "Rev", "rev",
    "ser", "Sept", "Sr", "St", "Ste", "suppl", "trans", "tr", "Univ", "v", "vol", "vols",
    "Vol", "Vols", "vs",
];

const PERSON_PRETITLE_LIST: &[&str] = &[
    "master", "mr", "miss", "ms", "mrs", "mx", "sir", "mistress", "madam", "madame", "maam",
    "ma am",
    "dame", "lord", "lady", "the honourable", "the honorable", "the right honourable",
    "the right honorable", "the most honourable", "the most honorable", "the hon", "hon", "dr",
    "doctor", "professor", "excellency", "his excellency", "her excellency", "chancellor",
    "vice chancellor", "principal", "president", "warden", "dean", "regent", "rector",
    "provost", "director", "chief executive", "his holiness", "hh", "pope", "pope emeritus",
    "his all holiness", "hah", "his beatitude", "his most eminent highness", "hmeh",
    "his eminence", "he", "most reverend eminence", "the most reverend", "the most rev",
    "the most revd", "his grace", "the right reverend", "the rt rev", "the rt revd",
    "his lordship", "the reverend", "reverend", "the rev", "rev", "the revd", "revd", "father",
    "fr", "pastor", "pr", "brother", "br", "sister", "sr", "elder", "saint", "rabbi", "cantor",
    "chief rabbi", "grand rabbi", "rebbetzin", "imam", "imām", "shaykh", "muftī", "mufti",
    "hāfiz", "hafiz", "hāfizah", "hafizah", "qārī", "qari", "mawlānā", "mawlana", "hājī",
    "haji", "sayyid", "sayyidah", "sharif", "venerable", "ven", "eminent", "emi", "of", "af",
    "von", "de", "d", "du", "des", "zu", "van", "den", "der", "van de", "van der", "van den",
    "emperor", "empress", "king emperor", "queen empress", "kaiser", "tsar", "tsarina",
    "high king", "high queen", "great king", "great queen", "king", "queen", "archduke",
    "archduchess", "tsesarevich", "grand prince", "grand princess", "grand duke",
    "grand duchess", "prince-elector", "prince", "princess", "crown prince", "crown princess",
    "foreign prince", "prince du sang", "infante", "infanta", "dauphin", "dauphine",
    "królewicz", "krolewicz", "królewna", "krolewna", "jarl", "tsarevich", "tsarevna", "duke",
    "duchess", "herzog", "knyaz", "princely count", "sovereign prince", "sovereign princess",
    "fürst", "furst", "fürstin", "furstin", "boyar", "marquess", "marquis", "marchioness",
    "margrave", "marcher lord", "landgrave", "count palatine", "count", "countess", "earl",
    "graf", "châtelain", "chatelain", "castellan", "burgrave", "burggrave", "viscount",
    "viscountess", "vidame", "baron", "baroness", "freiherr", "advocatus", "thane", "lendmann",
    "baronet", "baronetess", "seigneur", "laird", "lord of the manor", "gentleman", "maid",
    "don",
];

const NAME_PARTICLE_LIST: &[&str] = &[
    "of", "af", "von", "de", "d", "du", "des", "zu", "van", "den", "der", "van de", "van der",
    "van den",
];

const RELATOR_CODE_LIST: &[(&str, &str)] = &[
    ("abr", "abridger"),
    ("act", "actor"),
    ("adp", "adapter"),
    ("aft", "author of afterword, colophon, etc."),
    ("anm", "animator"),
    ("ann", "annotator"),
    ("arc", "architect"),
    ("arr", "arranger"),
    ("art", "artist"),
    ("aud", "author of dialog"),
    ("aui", "author of introduction, etc."),
    ("aus", "screenwriter"),
    ("aut", "author"),
    ("bkd", "book designer"),
    ("bnd", "binder"),
    ("chr", "choreographer"),
    ("cll", "calligrapher"),
    ("cmm", "commentator"),
    ("cmp", "composer"),
    ("cnd", "conductor"),
    ("cng", "cinematographer"),
    ("col", "collector"),
    ("com", "compiler"),
    ("cov", "cover designer"),
    ("cph", "copyright holder"),
    ("cre", "creator"),
    ("ctb", "contributor"),
    ("ctg", "cartographer"),
    ("cur", "curator"),
    ("cwt", "commentator for written text"),
    ("dnc", "dancer"),
    ("dnr", "donor"),
    ("drt", "director"),
    ("dsr", "designer"),
    ("dst", "distributor"),
    ("dte", "dedicatee"),
    ("dto", "dedicator"),
    ("edc", "editor of compilation"),
    ("edt", "editor"),
    ("egr", "engraver"),
    ("fmo", "former owner"),
    ("hnr", "honoree"),
    ("ill", "illustrator"),
    ("ilu", "illuminator"),
    ("ins", "inscriber"),
    ("itr", "instrumentalist"),
    ("ive", "interviewee"),
    ("ivr", "interviewer"),
    ("lbt", "librettist"),
    ("ltg", "lithographer"),
    ("lyr", "lyricist"),
    ("mus", "musician"),
    ("nrt", "narrator"),
    ("orm", "organizer"),
    ("oth", "other"),
    ("own", "owner"),
    ("pbl", "publisher"),
    ("pht", "photographer"),
    ("prf", "performer"),
    ("prg", "programmer"),
    ("pro", "producer"),
    ("prt", "printer"),
    ("res", "researcher"),
    ("rev", "reviewer"),
    ("scl", "sculptor"),
    ("sng", "singer"),
    ("spk", "speaker"),
    ("spn", "sponsor"),
    ("stl", "storyteller"),
    ("ths", "thesis advisor"),
    ("trc", "transcriber"),
    ("trl", "translator"),
    ("voc", "vocalist"),
    ("wac", "writer of added commentary"),
    ("wal", "writer of added lyrics"),
    ("wam", "writer of accompanying material"),
    ("wat", "writer of added text"),
    ("win", "writer of introduction"),
    ("wpr", "writer of preface"),
    ("wst", "writer of supplementary textual content"),
];

lazy_static! {
    /// Abbreviations whose trailing period is not structural.
    pub static ref ABBREVIATIONS: HashSet<&'static str> =
        ABBREVIATION_LIST.iter().copied().collect();
    /// Titles that can precede a personal name.
    pub static ref PERSON_PRETITLES: HashSet<&'static str> =
        PERSON_PRETITLE_LIST.iter().copied().collect();
    /// Nobiliary particles.
    pub static ref NAME_PARTICLES: HashSet<&'static str> =
        NAME_PARTICLE_LIST.iter().copied().collect();
    /// Relator code to relator term, in code order.
    pub static ref RELATOR_CODES: IndexMap<&'static str, &'static str> =
        RELATOR_CODE_LIST.iter().copied().collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabularies_loaded() {
        assert!(ABBREVIATIONS.contains("eds"));
        assert!(!ABBREVIATIONS.contains("j"));
        assert!(PERSON_PRETITLES.contains("king"));
        assert!(PERSON_PRETITLES.contains("great queen"));
        assert!(NAME_PARTICLES.contains("van der"));
        assert_eq!(RELATOR_CODES.get("edt"), Some(&"editor"));
    }
}
