#[derive(Debug, Clone, PartialEq)]
pub enum FieldRange {
    String,
    Integer,
    Float,
    Boolean,
    Enum(Vec<String>),
}

/// A declared field. `required` means the value may not be null.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub range: FieldRange,
    pub required: bool,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl FieldDef {
    pub fn new(name: &str, range: FieldRange) -> Self {
        Self {
            name: name.to_string(),
            range,
            required: true,
            pattern: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldRange::String)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldRange::Integer)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldRange::Float)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldRange::Boolean)
    }

    pub fn enumeration(name: &str, values: &[&str]) -> Self {
        Self::new(
            name,
            FieldRange::Enum(values.iter().map(|value| value.to_string()).collect()),
        )
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    pub fn bounds(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

/// A target schema for one kind of source row. Kept as data so derived
/// models can narrow or extend a base one.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaModel {
    name: String,
    fields: Vec<FieldDef>,
    forbid_extra: bool,
}

impl SchemaModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            forbid_extra: false,
        }
    }

    /// Columns the model does not declare become per-row errors.
    pub fn forbid_extra(mut self) -> Self {
        self.forbid_extra = true;
        self
    }

    pub fn forbids_extra(&self) -> bool {
        self.forbid_extra
    }

    /// Adds a field, replacing any existing field of the same name in place.
    pub fn field(mut self, field: FieldDef) -> Self {
        match self.fields.iter_mut().find(|existing| existing.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn extend(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: self.fields.clone(),
            forbid_extra: self.forbid_extra,
        }
    }

    pub fn without(mut self, name: &str) -> Self {
        self.fields.retain(|field| field.name != name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

const SAMPLE_ID_PATTERN: &str = r"^(?:NA|HG)\d{3}(?:\d{2})?$";
const NO_WHITESPACE_PATTERN: &str = r"^\S+$";

const PHASING: &[&str] = &["trio", "hic", "strandseq"];
const FILE_TYPES: &[&str] = &["fastq", "fast5", "tar", "bam", "cram"];
const INSTRUMENT_MODELS: &[&str] = &[
    "PacBio Sequel II",
    "PromethION",
    "NextSeq 500",
    "NextSeq 550",
    "Illumina NovaSeq 6000",
    "GridION",
    "MinION",
    "Revio",
    "Sequel II",
];
const LIBRARY_STRATEGIES: &[&str] = &["Hi-C", "isoseq", "WGS", "OTHER"];
const LIBRARY_SOURCES: &[&str] = &["GENOMIC", "transcriptomic"];
const PLATFORMS: &[&str] = &["ILLUMINA", "PACBIO_SMRT", "OXFORD_NANOPORE"];

fn haplotype() -> FieldDef {
    FieldDef::integer("haplotype").bounds(0.0, 2.0)
}

pub fn assembly() -> SchemaModel {
    SchemaModel::new("Assembly")
        .field(FieldDef::string("sample_id"))
        .field(FieldDef::string("assembly_name"))
        .field(haplotype())
        .field(FieldDef::enumeration("phasing", PHASING))
        .field(FieldDef::string("assembly_method").optional())
        .field(FieldDef::string("assembly_method_version").optional())
        .field(FieldDef::string("assembly_date").optional())
        .field(FieldDef::string("genbank_accession").optional())
        .field(FieldDef::string("assembly_md5").optional())
        .field(FieldDef::string("assembly_fai").optional())
        .field(FieldDef::string("assembly_gzi").optional())
        .field(FieldDef::string("assembly"))
}

pub fn release_one_assembly() -> SchemaModel {
    SchemaModel::new("ReleaseOneAssembly")
        .field(FieldDef::string("sample_id"))
        .field(haplotype())
        .field(FieldDef::string("assembly"))
        .field(FieldDef::string("fasta_sha256"))
}

pub fn annotation() -> SchemaModel {
    SchemaModel::new("Annotation")
        .field(FieldDef::string("sample_id"))
        .field(haplotype())
        .field(FieldDef::string("assembly_name"))
        .field(FieldDef::string("location"))
}

pub fn release_one_annotation() -> SchemaModel {
    SchemaModel::new("ReleaseOneAnnotation")
        .field(FieldDef::string("sample_id"))
        .field(haplotype().optional())
        .field(FieldDef::string("location"))
}

pub fn release_one_flagger_annotation() -> SchemaModel {
    SchemaModel::new("ReleaseOneFlaggerAnnotation")
        .field(FieldDef::string("sample_id"))
        .field(FieldDef::string("location"))
}

pub fn alignment() -> SchemaModel {
    SchemaModel::new("Alignment")
        .field(FieldDef::string("alignment"))
        .field(FieldDef::string("file_size"))
        .field(FieldDef::string("file"))
        .field(FieldDef::string("loc"))
        .field(FieldDef::string("pipeline"))
        .field(FieldDef::string("reference_coordinates").optional())
        .field(FieldDef::string("version").optional())
        .forbid_extra()
}

/// Fields shared by every sequencing run sheet.
pub fn sequencing_data() -> SchemaModel {
    SchemaModel::new("SequencingData")
        .field(FieldDef::string("filename").pattern(NO_WHITESPACE_PATTERN))
        .field(FieldDef::enumeration("filetype", FILE_TYPES))
        .field(FieldDef::enumeration("instrument_model", INSTRUMENT_MODELS))
        .field(FieldDef::enumeration("library_strategy", LIBRARY_STRATEGIES))
        .field(FieldDef::string("path"))
        .field(FieldDef::string("sample_id").pattern(SAMPLE_ID_PATTERN))
}

fn optional_strings(model: SchemaModel, names: &[&str]) -> SchemaModel {
    names.iter().fold(model, |model, name| {
        model.field(FieldDef::string(name).optional())
    })
}

fn library_source() -> FieldDef {
    FieldDef::enumeration("library_source", LIBRARY_SOURCES)
}

fn platform() -> FieldDef {
    FieldDef::enumeration("platform", PLATFORMS)
}

pub fn hic_sequencing_data() -> SchemaModel {
    let model = sequencing_data()
        .extend("HicSequencingData")
        .field(FieldDef::float("coverage"))
        .field(library_source())
        .field(platform())
        .field(FieldDef::string("production"))
        .field(FieldDef::float("total_gbp"));
    optional_strings(
        model,
        &[
            "accession",
            "bioproject_accession",
            "biosample_accession",
            "generator_contact",
            "generator_facility",
            "study",
        ],
    )
}

pub fn deep_consensus_sequencing_data() -> SchemaModel {
    let model = sequencing_data()
        .extend("DeepConsensusSequencingData")
        .field(library_source())
        .field(FieldDef::integer("n50"))
        .field(platform())
        .field(FieldDef::float("total_gbp"))
        .field(FieldDef::integer("total_reads"));
    optional_strings(
        model,
        &[
            "accession",
            "bioproject_accession",
            "biosample_accession",
            "generator_contact",
            "generator_facility",
            "study",
        ],
    )
}

pub fn hifi_sequencing_data() -> SchemaModel {
    let model = sequencing_data()
        .extend("HifiSequencingData")
        .field(FieldDef::string("ccs_algorithm"))
        .field(FieldDef::float("coverage"))
        .field(FieldDef::float("deepconsensus_coverage").optional())
        .field(library_source())
        .field(FieldDef::boolean("mm_tag"))
        .field(FieldDef::integer("n50"))
        .field(platform())
        .field(FieldDef::string("production"))
        .field(FieldDef::float("total_gbp"))
        .field(FieldDef::integer("total_reads"));
    optional_strings(
        model,
        &[
            "accession",
            "bioproject_accession",
            "biosample_accession",
            "deepconsensus_filename",
            "deepconsensus_path",
            "generator_contact",
            "generator_facility",
            "lima_version",
            "primrose_filename",
            "study",
        ],
    )
}

pub fn illumina_sequencing_data() -> SchemaModel {
    let model = sequencing_data()
        .extend("IlluminaSequencingData")
        .field(FieldDef::float("coverage"))
        .field(FieldDef::string("family_id"))
        .field(FieldDef::string("gender"))
        .field(FieldDef::string("phasing"))
        .field(platform())
        .field(FieldDef::string("relationship"))
        .field(FieldDef::float("total_gbp"));
    optional_strings(
        model,
        &[
            "basecaller",
            "basecaller_version",
            "maternal_id",
            "other_comments",
            "paternal_id",
            "second_order",
            "siblings",
            "third_order",
        ],
    )
}

pub fn kinnex_sequencing_data() -> SchemaModel {
    let model = sequencing_data()
        .extend("KinnexSequencingData")
        .field(FieldDef::string("barcode"))
        .field(FieldDef::string("basecaller"))
        .field(FieldDef::string("basecaller_version"))
        .field(FieldDef::string("ccs_algorithm"))
        .field(FieldDef::string("iso_filename"))
        .field(library_source())
        .field(platform())
        .field(FieldDef::string("platform_unit_1"))
        .field(FieldDef::string("platform_unit_2"))
        .field(FieldDef::string("pool"))
        .field(FieldDef::string("production"))
        .field(FieldDef::integer("total_reads"));
    optional_strings(
        model,
        &[
            "accession",
            "bioproject_accession",
            "biosample_accession",
            "generator_contact",
            "generator_facility",
            "lima_version",
            "study",
        ],
    )
}

pub fn ont_sequencing_data() -> SchemaModel {
    let model = sequencing_data()
        .extend("OntSequencingData")
        .field(FieldDef::float("coverage_over_100kb"))
        .field(FieldDef::string("basecaller"))
        .field(FieldDef::string("basecaller_model"))
        .field(FieldDef::string("basecaller_version"))
        .field(FieldDef::float("coverage"))
        .field(library_source())
        .field(FieldDef::integer("n50"))
        .field(platform())
        .field(FieldDef::string("production"))
        .field(FieldDef::string("sequencing_chemistry"))
        .field(FieldDef::float("total_gbp"))
        .field(FieldDef::integer("whales"));
    optional_strings(
        model,
        &[
            "accession",
            "bioproject_accession",
            "biosample_accession",
            "generator_contact",
            "generator_facility",
            "study",
        ],
    )
}
