//! VCF file parsing using noodles-vcf
//!
//! Headers are parsed into a noodles header, which also renders them back
//! out. Records are read lazily and converted into [`VcfRecord`] with their
//! INFO and sample text kept as written.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::vcf as nvcf;
use nvcf::header::record::value::map::{info, Filter, Info};
use nvcf::header::record::value::Map;
use nvcf::header::record::value::map::info::Number;

use crate::error::SiftError;

use super::record::{InfoValue, VcfRecord};

/// An `##INFO=<...>` definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoDefinition {
    pub id: String,
    /// `Number=` text (`1`, `A`, `R`, `G` or `.`)
    pub number: String,
    /// `Type=` text
    pub kind: String,
    pub description: String,
}

impl InfoDefinition {
    fn from_map(id: &str, map: &Map<Info>) -> Self {
        let number = match map.number() {
            Number::Count(n) => n.to_string(),
            Number::AlternateBases => "A".to_string(),
            Number::ReferenceAlternateBases => "R".to_string(),
            Number::Samples => "G".to_string(),
            _ => ".".to_string(),
        };
        let kind = match map.ty() {
            info::Type::Integer => "Integer",
            info::Type::Float => "Float",
            info::Type::Flag => "Flag",
            info::Type::Character => "Character",
            info::Type::String => "String",
        };

        Self {
            id: id.to_string(),
            number,
            kind: kind.to_string(),
            description: map.description().to_string(),
        }
    }

    fn to_map(&self) -> Map<Info> {
        let number = match self.number.as_str() {
            "A" => Number::AlternateBases,
            "R" => Number::ReferenceAlternateBases,
            "G" => Number::Samples,
            n => n.parse().map_or(Number::Unknown, Number::Count),
        };
        let ty = match self.kind.as_str() {
            "Integer" => info::Type::Integer,
            "Float" => info::Type::Float,
            "Flag" => info::Type::Flag,
            "Character" => info::Type::Character,
            _ => info::Type::String,
        };
        Map::<Info>::new(number, ty, self.description.clone())
    }

    /// Render as a header line
    pub fn to_line(&self) -> String {
        format!(
            "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
            self.id, self.number, self.kind, self.description
        )
    }
}

/// A parsed VCF file header
#[derive(Debug, Clone, Default)]
pub struct VcfHeader {
    inner: nvcf::Header,
}

impl From<nvcf::Header> for VcfHeader {
    fn from(inner: nvcf::Header) -> Self {
        Self { inner }
    }
}

impl VcfHeader {
    /// The underlying noodles header
    pub fn as_noodles(&self) -> &nvcf::Header {
        &self.inner
    }

    /// Get the number of samples in the VCF
    pub fn sample_count(&self) -> usize {
        self.inner.sample_names().len()
    }

    /// Sample names from the header line
    pub fn samples(&self) -> Vec<&str> {
        self.inner.sample_names().iter().map(String::as_str).collect()
    }

    /// Position of a sample by name
    pub fn sample_index(&self, name: &str) -> Option<usize> {
        self.inner.sample_names().get_index_of(name)
    }

    /// Contigs defined in the header (`##contig` lines)
    pub fn contigs(&self) -> Vec<String> {
        self.inner.contigs().keys().map(|k| k.to_string()).collect()
    }

    /// Declare an INFO field, replacing an existing definition of the ID
    pub fn add_info(&mut self, definition: &InfoDefinition) {
        self.inner
            .infos_mut()
            .insert(definition.id.clone(), definition.to_map());
    }

    /// Declare a FILTER value, once
    pub fn add_filter(&mut self, id: &str, description: &str) {
        let filters = self.inner.filters_mut();
        if !filters.contains_key(id) {
            filters.insert(id.to_string(), Map::<Filter>::new(description));
        }
    }

    /// Check whether an `##INFO` ID is defined
    pub fn has_info(&self, id: &str) -> bool {
        self.inner.infos().contains_key(id)
    }

    /// Look up an `##INFO` definition by ID
    pub fn info_definition(&self, id: &str) -> Option<InfoDefinition> {
        self.inner
            .infos()
            .get(id)
            .map(|map| InfoDefinition::from_map(id, map))
    }

    /// All `##INFO` definitions in header order
    pub fn info_definitions(&self) -> Vec<InfoDefinition> {
        self.inner
            .infos()
            .iter()
            .map(|(id, map)| InfoDefinition::from_map(id, map))
            .collect()
    }

    fn write_to<W: Write>(&self, out: W) -> io::Result<()> {
        nvcf::io::Writer::new(out).write_header(&self.inner)
    }
}

impl std::fmt::Display for VcfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = Vec::new();
        self.write_to(&mut buf).map_err(|_| std::fmt::Error)?;
        f.write_str(String::from_utf8_lossy(&buf).trim_end_matches('\n'))
    }
}

/// VCF file reader that yields VcfRecord instances
pub struct VcfReader<R> {
    inner: nvcf::io::Reader<R>,
    header: VcfHeader,
    record: nvcf::Record,
    /// Records read so far
    count: usize,
}

impl<R: BufRead> VcfReader<R> {
    /// Create a new VCF reader, consuming the header
    pub fn new(reader: R) -> Result<Self, SiftError> {
        let mut inner = nvcf::io::Reader::new(reader);
        let header = inner.read_header().map_err(|e| SiftError::Io {
            msg: format!("Failed to parse VCF header: {}", e),
        })?;

        Ok(Self {
            inner,
            header: VcfHeader::from(header),
            record: nvcf::Record::default(),
            count: 0,
        })
    }

    /// Get a reference to the parsed header
    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    /// Get a mutable reference to the header
    pub fn header_mut(&mut self) -> &mut VcfHeader {
        &mut self.header
    }

    /// Read the next VCF record
    pub fn read_record(&mut self) -> Result<Option<VcfRecord>, SiftError> {
        match self.inner.read_record(&mut self.record) {
            Ok(0) => Ok(None),
            Ok(_) => {
                self.count += 1;
                convert_record(&self.record, self.count).map(Some)
            }
            Err(e) => Err(SiftError::InvalidVcf {
                record: self.count + 1,
                msg: e.to_string(),
            }),
        }
    }

    /// Iterate over all records in the VCF file
    pub fn records(self) -> VcfRecordIterator<R> {
        VcfRecordIterator {
            reader: self,
            done: false,
        }
    }
}

/// Open a VCF file from a path; `-` reads stdin and `.gz` files are decompressed
pub fn open_vcf<P: AsRef<Path>>(path: P) -> Result<VcfReader<Box<dyn BufRead>>, SiftError> {
    let path = path.as_ref();
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(path).map_err(|e| SiftError::Io {
            msg: format!("Failed to open VCF file {}: {}", path.display(), e),
        })?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };
    VcfReader::new(reader)
}

/// Parse VCF from a string
pub fn parse_vcf_string(vcf_content: &str) -> Result<VcfReader<BufReader<&[u8]>>, SiftError> {
    let reader = BufReader::new(vcf_content.as_bytes());
    VcfReader::new(reader)
}

/// Iterator over VCF records
pub struct VcfRecordIterator<R> {
    reader: VcfReader<R>,
    done: bool,
}

impl<R: BufRead> Iterator for VcfRecordIterator<R> {
    type Item = Result<VcfRecord, SiftError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Column text as written, None when missing
fn column<T: AsRef<str>>(field: T) -> Option<String> {
    let text = field.as_ref();
    (!text.is_empty() && text != ".").then(|| text.to_string())
}

/// Convert a noodles VCF record to our VcfRecord type
fn convert_record(record: &nvcf::Record, number: usize) -> Result<VcfRecord, SiftError> {
    let invalid = |what: &str, e: io::Error| SiftError::InvalidVcf {
        record: number,
        msg: format!("invalid {}: {}", what, e),
    };

    let chrom = record.reference_sequence_name().to_string();

    // Position 0 marks a telomere
    let pos = record
        .variant_start()
        .transpose()
        .map_err(|e| invalid("position", e))?
        .map_or(0, |p| usize::from(p) as u64);

    let quality = record
        .quality_score()
        .transpose()
        .map_err(|e| invalid("quality", e))?
        .map(|q| q.to_string());

    let alternate = column(record.alternate_bases())
        .map(|alts| alts.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let info = column(record.info())
        .map(|text| {
            text.split(';')
                .filter(|entry| !entry.is_empty())
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), InfoValue::String(v.to_string())),
                    None => (entry.to_string(), InfoValue::Flag),
                })
                .collect()
        })
        .unwrap_or_default();

    // FORMAT keys followed by one column per sample
    let (format, samples) = match column(record.samples()) {
        Some(text) => {
            let mut columns = text.split('\t');
            let format = columns.next().unwrap_or_default().to_string();
            let keys: Vec<&str> = format.split(':').collect();
            let samples = columns
                .map(|sample| {
                    keys.iter()
                        .zip(sample.split(':'))
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .collect();
            (Some(format.clone()), samples)
        }
        None => (None, Vec::new()),
    };

    Ok(VcfRecord {
        chrom,
        pos,
        id: column(record.ids()),
        reference: column(record.reference_bases()).unwrap_or_default(),
        alternate,
        quality,
        filter: column(record.filters()),
        info,
        format,
        samples,
    })
}

/// Writes a header followed by records
pub struct VcfWriter<W: Write> {
    inner: W,
}

impl<W: Write> VcfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_header(&mut self, header: &VcfHeader) -> Result<(), SiftError> {
        header.write_to(&mut self.inner)?;
        Ok(())
    }

    pub fn write_record(&mut self, record: &VcfRecord) -> Result<(), SiftError> {
        writeln!(self.inner, "{}", record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SiftError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}
