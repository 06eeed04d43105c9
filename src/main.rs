//! Command line utilities for the HMP2/IBDMDB data pipeline: metadata
//! assembly, DCC document maintenance and file conversions.
use std::path::PathBuf;

use anyhow::Result;
use log::{info, LevelFilter};
use structopt::StructOpt;

use cli::Command::*;

mod cli;
pub mod common;
pub mod config;
pub mod convert;
pub mod dcc;
pub mod errors;
pub mod manifest;
pub mod metadata;
pub mod table;
pub mod tasks;

use config::ProjectConfig;

fn load_config(args: &cli::ConfigArgs) -> Result<ProjectConfig> {
    match &args.config {
        Some(path) => ProjectConfig::from_path(path, args.section.as_deref()),
        None => Ok(ProjectConfig::default()),
    }
}

fn connect(args: &cli::DccArgs) -> Result<dcc::osdf::OsdfClient> {
    dcc::osdf::OsdfClient::new(&args.server, &args.username, &args.password, &args.namespace)
}

fn origin(args: cli::OriginArgs) -> manifest::Origin {
    manifest::Origin::new(
        args.origin_institute,
        args.origin_contact,
        args.origin_contact_email,
        args.project,
    )
}

fn main() -> Result<()> {
    let args = cli::Hmp2::from_args();

    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    match args.cmd {
        UpdateMetadata {
            config,
            manifest,
            clinical,
            tracking,
            proteomics,
            biopsy_dates,
            existing,
            auxiliary,
            add_all_stool_collections,
            output_dir,
        } => {
            let config = load_config(&config)?;
            let sources = metadata::merge::MetadataSources::load(clinical, tracking, proteomics, biopsy_dates)?;
            let manifest = manifest.map(manifest::Manifest::load).transpose()?;
            let update =
                metadata::merge::MetadataUpdate::new(manifest, existing, auxiliary, add_all_stool_collections);
            let table = update.run(&config, &sources)?;
            metadata::merge::write_metadata(&table, output_dir)?;
        }
        SampleMetadata {
            metadata,
            data_type,
            id_col,
            output_dir,
            files,
        } => {
            let table = table::Table::from_path_with_delimiter(metadata, b',')?;
            let written = metadata::pcl::write_sample_metadata(&table, &data_type, &files, output_dir, &id_col)?;
            info!("Wrote {} sample metadata files.", written.len());
        }
        AddMetadataToTsv {
            config,
            metadata,
            data_type,
            id_col,
            supplement,
            drop_missing_cols,
            feature_columns,
            files,
        } => {
            let config = load_config(&config)?;
            let supplements = supplement
                .into_iter()
                .map(|path| -> Result<(PathBuf, table::Table)> {
                    let table = metadata::read_supplement(&path)?;
                    Ok((path, table))
                })
                .collect::<Result<Vec<_>>>()?;
            let decorator = metadata::pcl::MetadataDecorator::new(
                table::Table::from_path_with_delimiter(metadata, b',')?,
                data_type,
                id_col,
                config.analysis_col_patterns,
                config.target_metadata_cols,
                supplements,
                drop_missing_cols,
                feature_columns,
            );
            for file in files {
                let output = decorator.decorate(&file)?;
                info!("Wrote {}", output.display());
            }
        }
        RenameAnalysisIds {
            config,
            metadata,
            data_type,
            from_id,
            to_id,
            keep_tag,
            analysis_file,
            output,
        } => {
            let config = load_config(&config)?;
            let table = table::Table::from_path_with_delimiter(metadata, b',')?;
            let renamed = metadata::rename::rename_analysis_ids(
                analysis_file,
                &table,
                &data_type,
                &from_id,
                &to_id,
                &config.analysis_col_patterns,
                keep_tag,
                output,
            )?;
            info!("Renamed {} columns.", renamed);
        }
        RenameFiles {
            metadata,
            data_type,
            from_id,
            to_id,
            extension,
            pair_identifier,
            tag,
            output_dir,
            copy,
            symlink,
            dry_run,
            input_dir,
        } => {
            let mode = if symlink {
                metadata::rename::RenameMode::Symlink
            } else if copy {
                metadata::rename::RenameMode::Copy
            } else {
                metadata::rename::RenameMode::Move
            };
            let table = table::Table::from_path_with_delimiter(metadata, b',')?;
            let renamer = metadata::rename::FileRenamer::new(
                from_id,
                to_id,
                data_type,
                pair_identifier,
                tag,
                output_dir,
                mode,
                dry_run,
            );
            let renamed = renamer.rename_files(input_dir, &extension, &table)?;
            info!("Renamed {} files.", renamed.len());
        }
        HarmonizeMetadata {
            metadata,
            samples,
            output,
        } => metadata::harmonize::harmonize_metadata(metadata, samples, output)?,
        HarmonizeTsv {
            tsv,
            samples,
            output,
        } => metadata::harmonize::harmonize_tsv(tsv, samples, output)?,
        HumanReadableMetadata {
            config,
            metadata,
            dictionary,
            output,
        } => {
            let config = load_config(&config)?;
            metadata::readable::human_readable_metadata(metadata, &config, dictionary, output)?
        }
        QcSampleMapping {
            config,
            manifest,
            clinical,
            tracking,
        } => {
            let config = load_config(&config)?;
            let manifest = manifest::Manifest::load(manifest)?;
            let clinical = table::Table::from_path_with_delimiter(clinical, b',')?;
            let tracking = table::Table::from_path_with_delimiter(tracking, b',')?;
            metadata::qc::qc_sample_mapping(&manifest, &clinical, &tracking, &config);
        }
        FixViromicIds {
            samples,
            clinical,
            tracking,
            output,
        } => metadata::viromics::fix_viromic_ids(samples, clinical, tracking, output)?,
        SampleCounts {
            config,
            metadata,
            clinical,
        } => {
            let config = load_config(&config)?;
            let table = table::Table::from_path_with_delimiter(metadata, b',')?;
            let clinical = table::Table::from_path_with_delimiter(clinical, b',')?;
            let stool = metadata::counts::stool_counts(&table, &clinical, &config);
            let biopsy = metadata::counts::biopsy_counts(&table);
            metadata::counts::log_counts(&stool, &biopsy);
        }
        ManifestFromFileList {
            origin: origin_args,
            input_list,
            output_list,
            md5sums_file,
            data_type,
            output,
        } => {
            let manifest = manifest::Manifest::from_file_lists(
                origin(origin_args),
                input_list,
                output_list,
                md5sums_file,
                data_type.as_deref(),
            )?;
            manifest.dump(output)?
        }
        ManifestFromBroadSheet {
            origin: origin_args,
            sheet,
            output,
        } => manifest::Manifest::from_tracking_sheet(origin(origin_args), sheet)?.dump(output)?,
        DccDelete {
            dcc: dcc_args,
            study_id,
            node_type,
            delete_root,
            dry_run,
        } => {
            let store = connect(&dcc_args)?;
            let mut tree = dcc::tree::DocTree::build(&store, &study_id)?;
            if !node_type.is_empty() {
                let types: Vec<&str> = node_type.iter().map(|t| t.as_str()).collect();
                tree = tree.filter_by_types(&types);
            }
            info!("Deleting {} nodes below study {}.", tree.len() - 1, study_id);
            let report = dcc::delete::delete_tree(&store, &tree, dry_run, delete_root);
            info!(
                "Deleted {} nodes, {} failures, {} kept.",
                report.deleted.len(),
                report.failed.len(),
                report.kept.len()
            );
        }
        DccDeleteQuery {
            dcc: dcc_args,
            query,
            stop_type,
            dry_run,
        } => {
            let store = connect(&dcc_args)?;
            let report = dcc::delete::delete_from_query(&store, &query, &stop_type, dry_run)?;
            info!(
                "Deleted {} nodes, {} failures, {} kept.",
                report.deleted.len(),
                report.failed.len(),
                report.kept.len()
            );
        }
        DccUpload {
            dcc: dcc_args,
            documents,
        } => {
            let store = connect(&dcc_args)?;
            let documents = dcc::upload::read_documents(documents)?;
            let report = dcc::upload::upload_documents(&store, &documents)?;
            info!(
                "Saved {} documents, {} unchanged.",
                report.saved.len(),
                report.unchanged.len()
            );
        }
        BamToFastq {
            paired_end,
            compress,
            threads,
            output_dir,
            bams,
        } => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()?;
            let converter = convert::bam::BamToFastq::new(output_dir, paired_end, compress);
            convert::bam::bam_to_fastq(&bams, &converter)?;
        }
        DeinterleaveFastq {
            compress,
            threads,
            output_dir,
            files,
        } => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()?;
            convert::fastq::deinterleave_fastq(&files, output_dir, compress)?;
        }
        ExcelToCsv { output_dir, files } => {
            convert::excel::excel_to_csv(&files, output_dir)?;
        }
        TsvToBiom { files } => {
            convert::biom::tsv_to_biom(&files)?;
        }
        FixOtuTaxonomy {
            output_dir,
            otu_table,
        } => {
            convert::otu::fix_otu_taxonomy_labels(otu_table, output_dir)?;
        }
        RelativeAbundance {
            output_dir,
            counts_table,
        } => {
            convert::abundance::relative_abundance(counts_table, output_dir)?;
        }
        VerifyChecksums { checksums, files } => {
            let verified = tasks::checksums::verify_files(&files, checksums)?;
            info!("{} files passed verification.", verified.len());
        }
        GenerateChecksums { files } => {
            tasks::checksums::generate(&files)?;
        }
        StageFiles {
            target_dir,
            preserve_from,
            symlink,
            files,
        } => {
            tasks::stage::Stager::new(target_dir, preserve_from, symlink).stage_files(&files)?;
        }
        MakeWebVisible { files } => {
            tasks::stage::make_web_visible(&files)?;
        }
        TarFiles {
            output,
            compress,
            files,
        } => {
            tasks::stage::tar_files(&files, output, compress)?;
        }
        KneadLogCounts {
            input_dir,
            output,
            data_type,
            pair_identifier,
        } => tasks::kneaddata::knead_log_counts(input_dir, output, &data_type, &pair_identifier)?,
    }
    Ok(())
}
