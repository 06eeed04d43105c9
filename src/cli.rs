use std::path::PathBuf;
use structopt::StructOpt;

use crate::dcc;

#[derive(StructOpt)]
#[structopt(
    about = "Command line utilities for the HMP2/IBDMDB metadata, DCC submission and file conversion pipeline.",
    name = "hmp2"
)]
pub(crate) struct Hmp2 {
    #[structopt(long, short, help = "Verbose output.")]
    pub(crate) verbose: bool,

    #[structopt(subcommand)]
    pub(crate) cmd: Command,
}

/// Project configuration (YAML) shared by the metadata tools.
#[derive(StructOpt)]
pub(crate) struct ConfigArgs {
    /// Project configuration file.
    #[structopt(long, short = "c", parse(from_os_str))]
    pub(crate) config: Option<PathBuf>,

    /// Section of the configuration file to use, e.g. a data type.
    #[structopt(long)]
    pub(crate) section: Option<String>,
}

/// Connection to the DCC document store (OSDF).
#[derive(StructOpt)]
pub(crate) struct DccArgs {
    #[structopt(long, default_value = dcc::DEFAULT_SERVER)]
    pub(crate) server: String,

    #[structopt(long, short = "u")]
    pub(crate) username: String,

    #[structopt(long, short = "p")]
    pub(crate) password: String,

    #[structopt(long, default_value = dcc::DEFAULT_NAMESPACE)]
    pub(crate) namespace: String,
}

/// Submitter information written to a manifest.
#[derive(StructOpt)]
pub(crate) struct OriginArgs {
    #[structopt(long)]
    pub(crate) origin_institute: String,

    #[structopt(long)]
    pub(crate) origin_contact: String,

    #[structopt(long)]
    pub(crate) origin_contact_email: String,

    /// Research project the files belong to.
    #[structopt(long, short = "p", default_value = "HMP2")]
    pub(crate) project: String,
}

#[derive(StructOpt)]
pub(crate) enum Command {
    /// Add the samples of a submission to the HMP2 metadata table.
    ///
    /// Writes hmp2_metadata_<date>.csv to the output directory.
    ///
    /// Example:
    /// hmp2 update-metadata -m MANIFEST.yaml --clinical studytrax.csv --tracking broad_tracking.csv --existing hmp2_metadata.csv -o out
    UpdateMetadata {
        #[structopt(flatten)]
        config: ConfigArgs,

        /// Submission manifest.
        #[structopt(long, short = "m", parse(from_os_str))]
        manifest: Option<PathBuf>,

        /// Clinical (StudyTrax) metadata export.
        #[structopt(long, parse(from_os_str))]
        clinical: PathBuf,

        /// Broad sample tracking sheet.
        #[structopt(long, parse(from_os_str))]
        tracking: PathBuf,

        /// Proteomics id mapping sheet (tab-delimited).
        #[structopt(long, parse(from_os_str))]
        proteomics: Option<PathBuf>,

        /// Biopsy collection dates (tab-delimited).
        #[structopt(long, parse(from_os_str))]
        biopsy_dates: Option<PathBuf>,

        /// Existing metadata table to extend.
        #[structopt(long, parse(from_os_str))]
        existing: Option<PathBuf>,

        /// Auxiliary metadata to merge in, keyed on its first column.
        #[structopt(long, short = "a", parse(from_os_str))]
        auxiliary: Vec<PathBuf>,

        /// Add a row for every stool collection, even without data.
        #[structopt(long)]
        add_all_stool_collections: bool,

        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,
    },

    /// Write one metadata CSV per sample to <output-dir>/metadata.
    ///
    /// Example:
    /// hmp2 sample-metadata -m hmp2_metadata.csv -d metagenomics -o out MSM5LLGE.fastq.gz MSM5LLGG.fastq.gz
    SampleMetadata {
        #[structopt(long, short = "m", parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(long, short = "d")]
        data_type: String,

        /// Metadata column holding the sample names.
        #[structopt(long, default_value = "External ID")]
        id_col: String,

        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Add metadata rows on top of analysis tables, producing <stem>.pcl.tsv.
    ///
    /// Example:
    /// hmp2 add-metadata-to-tsv -m hmp2_metadata.csv -d metagenomics -c config.yaml --section MGX taxonomic_profiles.tsv
    AddMetadataToTsv {
        #[structopt(flatten)]
        config: ConfigArgs,

        #[structopt(long, short = "m", parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(long, short = "d")]
        data_type: String,

        #[structopt(long, default_value = "External ID")]
        id_col: String,

        /// Supplementary metadata merged before decorating.
        #[structopt(long, short = "s", parse(from_os_str))]
        supplement: Vec<PathBuf>,

        /// Drop sample columns without metadata.
        #[structopt(long)]
        drop_missing_cols: bool,

        /// Number of leading feature columns.
        #[structopt(long, default_value = "1")]
        feature_columns: usize,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Rename the sample columns of an analysis table from one metadata id to another.
    ///
    /// Example:
    /// hmp2 rename-analysis-ids -m hmp2_metadata.csv -d proteomics --from-id "Site/Sub/Coll ID" --to-id "External ID" proteomics.tsv renamed.tsv
    RenameAnalysisIds {
        #[structopt(flatten)]
        config: ConfigArgs,

        #[structopt(long, short = "m", parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(long, short = "d")]
        data_type: String,

        #[structopt(long)]
        from_id: String,

        #[structopt(long)]
        to_id: String,

        /// Keep the suffix following the first `_` of a column header.
        #[structopt(long)]
        keep_tag: bool,

        #[structopt(parse(from_os_str))]
        analysis_file: PathBuf,

        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },

    /// Rename files named after one metadata id to another.
    ///
    /// Example:
    /// hmp2 rename-files -m hmp2_metadata.csv -d host_transcriptomics --from-id "Site/Sub/Coll ID" --to-id "External ID" -e .bam raw/
    RenameFiles {
        #[structopt(long, short = "m", parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(long, short = "d")]
        data_type: String,

        #[structopt(long)]
        from_id: String,

        #[structopt(long)]
        to_id: String,

        /// File extension to rename.
        #[structopt(long, short = "e")]
        extension: String,

        /// Mate identifier of paired-end files, e.g. _R1.
        #[structopt(long)]
        pair_identifier: Option<String>,

        /// Tag carried by the file names, removed before the lookup and kept in the new name.
        #[structopt(long)]
        tag: Option<String>,

        /// Write renamed files here instead of next to the originals.
        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: Option<PathBuf>,

        /// Copy instead of moving.
        #[structopt(long, conflicts_with = "symlink")]
        copy: bool,

        /// Symlink instead of moving.
        #[structopt(long)]
        symlink: bool,

        /// Only report what would be renamed.
        #[structopt(long)]
        dry_run: bool,

        #[structopt(parse(from_os_str))]
        input_dir: PathBuf,
    },

    /// Remove the samples listed in a removal file (id<TAB>data_type) from a metadata table.
    ///
    /// Example:
    /// hmp2 harmonize-metadata hmp2_metadata.csv remove.txt harmonized.csv
    HarmonizeMetadata {
        #[structopt(parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(parse(from_os_str))]
        samples: PathBuf,

        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },

    /// Remove the listed sample columns from an analysis table.
    ///
    /// Example:
    /// hmp2 harmonize-tsv ecs.tsv remove.txt ecs.harmonized.tsv
    HarmonizeTsv {
        #[structopt(parse(from_os_str))]
        tsv: PathBuf,

        #[structopt(parse(from_os_str))]
        samples: PathBuf,

        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },

    /// Recode metadata values and column names into human readable form using the data dictionary.
    ///
    /// Example:
    /// hmp2 human-readable-metadata -c config.yaml hmp2_metadata.csv data_dictionary.xlsx readable.csv
    HumanReadableMetadata {
        #[structopt(flatten)]
        config: ConfigArgs,

        #[structopt(parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(parse(from_os_str))]
        dictionary: PathBuf,

        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },

    /// Check that the samples of a manifest can be found in the clinical and tracking sheets.
    ///
    /// Example:
    /// hmp2 qc-sample-mapping -m MANIFEST.yaml --clinical studytrax.csv --tracking broad_tracking.csv
    QcSampleMapping {
        #[structopt(flatten)]
        config: ConfigArgs,

        #[structopt(long, short = "m", parse(from_os_str))]
        manifest: PathBuf,

        #[structopt(long, parse(from_os_str))]
        clinical: PathBuf,

        #[structopt(long, parse(from_os_str))]
        tracking: PathBuf,
    },

    /// Fix the viromics sample ids recorded in the clinical sheet.
    ///
    /// Example:
    /// hmp2 fix-viromic-ids samples.txt studytrax.csv broad_tracking.csv studytrax.fixed.csv
    FixViromicIds {
        /// File with one viromics sample id per line.
        #[structopt(parse(from_os_str))]
        samples: PathBuf,

        #[structopt(parse(from_os_str))]
        clinical: PathBuf,

        #[structopt(parse(from_os_str))]
        tracking: PathBuf,

        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },

    /// Report stool and biopsy sample counts of a metadata table.
    ///
    /// Example:
    /// hmp2 sample-counts -m hmp2_metadata.csv --clinical studytrax.csv
    SampleCounts {
        #[structopt(flatten)]
        config: ConfigArgs,

        #[structopt(long, short = "m", parse(from_os_str))]
        metadata: PathBuf,

        #[structopt(long, parse(from_os_str))]
        clinical: PathBuf,
    },

    /// Generate a manifest from a list of files (lines of PATH or DATA_TYPE;PATH).
    ///
    /// Example:
    /// hmp2 manifest-from-file-list -i files.txt -d MGX --origin-institute Broad --origin-contact "Jane Doe" --origin-contact-email jdoe@example.org -o MANIFEST.yaml
    ManifestFromFileList {
        #[structopt(flatten)]
        origin: OriginArgs,

        #[structopt(long, short = "i", parse(from_os_str))]
        input_list: PathBuf,

        #[structopt(long, parse(from_os_str))]
        output_list: Option<PathBuf>,

        #[structopt(long, parse(from_os_str))]
        md5sums_file: Option<PathBuf>,

        /// Data type of lines without one.
        #[structopt(long, short = "d")]
        data_type: Option<String>,

        #[structopt(long, short = "o", parse(from_os_str))]
        output: PathBuf,
    },

    /// Generate a manifest from a Broad data product sheet.
    ///
    /// Example:
    /// hmp2 manifest-from-broad-sheet --origin-institute Broad --origin-contact "Jane Doe" --origin-contact-email jdoe@example.org -o MANIFEST.yaml products.tsv
    ManifestFromBroadSheet {
        #[structopt(flatten)]
        origin: OriginArgs,

        #[structopt(parse(from_os_str))]
        sheet: PathBuf,

        #[structopt(long, short = "o", parse(from_os_str))]
        output: PathBuf,
    },

    /// Delete a study's documents from the DCC, children before parents.
    ///
    /// Example:
    /// hmp2 dcc-delete -u user -p password -s 52d8c92f2d3660b9add954d544a0216e -t host_seq_prep --dry-run
    DccDelete {
        #[structopt(flatten)]
        dcc: DccArgs,

        /// Id of the study document.
        #[structopt(long, short = "s")]
        study_id: String,

        /// Only delete nodes of these types and everything below them.
        #[structopt(long, short = "t")]
        node_type: Vec<String>,

        /// Also delete the study document.
        #[structopt(long)]
        delete_root: bool,

        #[structopt(long)]
        dry_run: bool,
    },

    /// Delete the documents matching an OQL query together with the documents they derive from.
    ///
    /// Example:
    /// hmp2 dcc-delete-query -u user -p password -q '"abundance_matrix"[node_type]' --dry-run
    DccDeleteQuery {
        #[structopt(flatten)]
        dcc: DccArgs,

        #[structopt(long, short = "q")]
        query: String,

        /// Node type the walk up from each hit stops at (not deleted).
        #[structopt(long, default_value = "subject")]
        stop_type: String,

        #[structopt(long)]
        dry_run: bool,
    },

    /// Upload new or modified documents (JSON array) to the DCC.
    ///
    /// Example:
    /// hmp2 dcc-upload -u user -p password documents.json
    DccUpload {
        #[structopt(flatten)]
        dcc: DccArgs,

        #[structopt(parse(from_os_str))]
        documents: PathBuf,
    },

    /// Convert BAM files to FASTQ.
    ///
    /// Example:
    /// hmp2 bam-to-fastq --paired-end --compress -t 4 -o out SM-9OSWF.bam
    BamToFastq {
        /// Write one file per mate to <output-dir>/fastq.
        #[structopt(long)]
        paired_end: bool,

        #[structopt(long)]
        compress: bool,

        #[structopt(long, short = "t", default_value = "1")]
        threads: usize,

        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,

        #[structopt(parse(from_os_str))]
        bams: Vec<PathBuf>,
    },

    /// Split interleaved FASTQ files into _R1 and _R2 files.
    ///
    /// Example:
    /// hmp2 deinterleave-fastq --compress -o out HSM6XRQY.fastq
    DeinterleaveFastq {
        #[structopt(long)]
        compress: bool,

        #[structopt(long, short = "t", default_value = "1")]
        threads: usize,

        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Convert the first worksheet of Excel workbooks to CSV.
    ///
    /// Example:
    /// hmp2 excel-to-csv -o out tracking.xlsx
    ExcelToCsv {
        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Convert OTU tables to BIOM, written to a biom folder next to each table.
    ///
    /// Example:
    /// hmp2 tsv-to-biom otu_table.tsv
    TsvToBiom {
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Label the taxonomy levels of a CMMR OTU table.
    ///
    /// Example:
    /// hmp2 fix-otu-taxonomy -o out otu_table.tsv
    FixOtuTaxonomy {
        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,

        #[structopt(parse(from_os_str))]
        otu_table: PathBuf,
    },

    /// Compute relative abundances from a counts table.
    ///
    /// Example:
    /// hmp2 relative-abundance -o out ecs.tsv
    RelativeAbundance {
        #[structopt(long, short = "o", parse(from_os_str))]
        output_dir: PathBuf,

        #[structopt(parse(from_os_str))]
        counts_table: PathBuf,
    },

    /// Verify files against md5 checksums.
    ///
    /// Example:
    /// hmp2 verify-checksums -c md5sums.txt raw/*.bam
    VerifyChecksums {
        #[structopt(long, short = "c", parse(from_os_str))]
        checksums: PathBuf,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Write a <stem>.md5 checksum file next to each file.
    ///
    /// Example:
    /// hmp2 generate-checksums out/*.tar
    GenerateChecksums {
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Copy or link files into a target directory.
    ///
    /// Example:
    /// hmp2 stage-files --symlink -t /public/MGX/2017-08-14 out/*.tsv
    StageFiles {
        #[structopt(long, short = "t", parse(from_os_str))]
        target_dir: PathBuf,

        /// Recreate the directory structure below this source directory.
        #[structopt(long, parse(from_os_str))]
        preserve_from: Option<PathBuf>,

        #[structopt(long)]
        symlink: bool,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Make the directories holding the given files visible on the IBDMDB website.
    ///
    /// Example:
    /// hmp2 make-web-visible /public/MGX/2017-08-14/*.tsv
    MakeWebVisible {
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Package files into a tarball without their directory structure.
    ///
    /// Example:
    /// hmp2 tar-files --compress -o profiles.tar.gz out/*_profile.tsv
    TarFiles {
        #[structopt(long, short = "o", parse(from_os_str))]
        output: PathBuf,

        #[structopt(long)]
        compress: bool,

        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },

    /// Build the KneadData read counts table from legacy KneadData logs.
    ///
    /// Example:
    /// hmp2 knead-log-counts -d MTX -o kneaddata_read_count_table.tsv logs/
    KneadLogCounts {
        #[structopt(parse(from_os_str))]
        input_dir: PathBuf,

        #[structopt(long, short = "o", parse(from_os_str))]
        output: PathBuf,

        #[structopt(long, short = "d", default_value = "MGX", possible_values = &["MGX", "MTX"])]
        data_type: String,

        #[structopt(long, default_value = "r1")]
        pair_identifier: String,
    },
}
