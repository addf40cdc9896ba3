use metallib_archive::test_utils::{LibraryBuilder, TestFunction};
use metallib_archive::{
    AirVersion, Archive, ArchiveError, DecodeOptions, DeploymentTarget, FourCC, FunctionType,
    LanguageVersion, LibraryType, LibraryVersion, OperatingSystem, OsVersion, ScanError,
    TargetPlatform,
};
use sha2::{Digest, Sha256};

const FILE_SIZE_FIELD: usize = 16;
const FUNCTION_LIST_OFFSET_FIELD: usize = 24;
const FUNCTION_LIST_SIZE_FIELD: usize = 32;
const BITCODE_SIZE_FIELD: usize = 80;

fn patch_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn two_function_library() -> LibraryBuilder {
    LibraryBuilder::new()
        .function(
            TestFunction::new("vertex_main", b"BC\xc0\xde vertex body")
                .function_type(Some(0))
                .language_version(2, 4),
        )
        .function(
            TestFunction::new("fragment_main", b"BC\xc0\xde fragment body")
                .function_type(Some(1))
                .language_version(2, 4),
        )
}

#[test]
fn empty_library_has_no_functions_or_source_archives() {
    let bytes = LibraryBuilder::new().build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert!(archive.functions().is_empty());
    assert!(archive.source_archives().is_empty());
    assert!(archive.header_extension_tags().is_empty());
    assert_eq!(archive.source_recording(), None);
    assert_eq!(archive.version(), LibraryVersion::new(1, 2));
    assert_eq!(archive.target_platform(), TargetPlatform::MacOs);
    assert_eq!(
        archive.deployment_target(),
        Some(DeploymentTarget {
            operating_system: OperatingSystem::MacOs,
            version: OsVersion::new(13, 0),
        })
    );
}

#[test]
fn empty_library_still_reads_header_extension_tags() {
    let bytes = LibraryBuilder::new()
        .header_extension_tag(FourCC(*b"UUID"), &[0xab; 16])
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert!(archive.functions().is_empty());
    let uuid = archive.header_extension_tag(FourCC(*b"UUID")).unwrap();
    assert_eq!(uuid.content, [0xab; 16]);
}

#[test]
fn decodes_function_fields() {
    let bytes = LibraryBuilder::new()
        .function(
            TestFunction::new("compute::blur<float>", b"BC\xc0\xde kernel")
                .function_type(Some(2))
                .air_version(2, 5)
                .language_version(3, 1),
        )
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    let function = &archive.functions()[0];
    assert_eq!(function.name, "compute::blur<float>");
    assert_eq!(function.function_type, Some(FunctionType::Kernel));
    assert_eq!(function.air_version, AirVersion::new(2, 5));
    assert_eq!(function.language_version, LanguageVersion::new(3, 1));
    assert_eq!(function.bitcode, b"BC\xc0\xde kernel");
    assert_eq!(function.tag(FourCC::NAME).unwrap().content, b"compute::blur<float>\0");
    assert!(archive.function("compute::blur<float>").is_some());
    assert!(archive.function("missing").is_none());
}

#[test]
fn functions_keep_on_disk_order() {
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("zeta", b"z"))
        .function(TestFunction::new("alpha", b"a"))
        .function(TestFunction::new("mid", b"m"))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    let names: Vec<_> = archive.functions().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
}

#[test]
fn every_function_bitcode_matches_its_hash() {
    let bytes = two_function_library().build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert_eq!(archive.functions().len(), 2);
    for function in archive.functions() {
        assert_eq!(
            Sha256::digest(&function.bitcode).as_slice(),
            function.bitcode_hash.as_slice()
        );
    }
}

#[test]
fn decoding_is_deterministic() {
    let bytes = two_function_library()
        .header_extension_tag(FourCC(*b"UUID"), &[7; 16])
        .build_bytes();
    let first = Archive::decode(&bytes).unwrap();
    let second = Archive::decode(&bytes).unwrap();
    assert_eq!(first, second);
}

#[test]
fn archive_outlives_input_buffer() {
    let archive = {
        let bytes = two_function_library().build_bytes();
        Archive::try_from(bytes.as_slice()).unwrap()
    };
    assert_eq!(archive.functions()[1].name, "fragment_main");
}

#[test]
fn file_size_must_match_buffer_length() {
    let mut bytes = two_function_library().build_bytes();
    let len = bytes.len();
    bytes.push(0);
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedFileSize {
            declared: len as u64,
            actual: len + 1,
        })
    );

    let mut bytes = two_function_library().build_bytes();
    patch_u64(&mut bytes, FILE_SIZE_FIELD, len as u64 - 1);
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedFileSize { .. })
    ));

    let bytes = two_function_library().build_bytes();
    assert!(matches!(
        Archive::decode(&bytes[..len - 1]),
        Err(ArchiveError::UnexpectedFileSize { .. })
    ));
}

#[test]
fn short_or_foreign_buffers_are_invalid_headers() {
    assert_eq!(Archive::decode(&[]), Err(ArchiveError::InvalidHeader));
    assert_eq!(Archive::decode(b"MTLB"), Err(ArchiveError::InvalidHeader));
    assert_eq!(Archive::decode(b"MTL"), Err(ArchiveError::InvalidHeader));

    let mut bytes = two_function_library().build_bytes();
    bytes[..4].copy_from_slice(b"DXBC");
    assert_eq!(Archive::decode(&bytes), Err(ArchiveError::InvalidHeader));

    let bytes = two_function_library().build_bytes();
    assert_eq!(Archive::decode(&bytes[..20]), Err(ArchiveError::InvalidHeader));
}

#[test]
fn partial_header_with_file_size_reports_size_mismatch() {
    let bytes = two_function_library().build_bytes();
    let declared = bytes.len() as u64;
    // The file size field ends at byte 24; everything past it is optional
    // for this check.
    for len in [24, 40, 87] {
        assert_eq!(
            Archive::decode(&bytes[..len]),
            Err(ArchiveError::UnexpectedFileSize {
                declared,
                actual: len,
            }),
            "prefix of {len} bytes"
        );
    }
}

#[test]
fn header_enumerations_are_validated() {
    let bytes = LibraryBuilder::new().target_platform(0x0002).build_bytes();
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedTargetPlatform(0x0002))
    );

    let bytes = LibraryBuilder::new().library_type(9).build_bytes();
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedLibraryType(9))
    );

    let bytes = LibraryBuilder::new().deployment_target(0x90, 1, 0).build_bytes();
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedOperatingSystemType(0x90))
    );
}

#[test]
fn zero_os_byte_means_no_deployment_target() {
    let bytes = LibraryBuilder::new().deployment_target(0, 99, 99).build_bytes();
    let archive = Archive::decode(&bytes).unwrap();
    assert_eq!(archive.deployment_target(), None);
}

#[test]
fn coarse_platform_and_precise_deployment_target_are_independent() {
    let bytes = LibraryBuilder::new()
        .target_platform(0x0001)
        .deployment_target(0x83, 16, 4)
        .function(TestFunction::new("tv_kernel", b"tv"))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert_eq!(archive.target_platform(), TargetPlatform::Ios);
    assert_eq!(
        archive.deployment_target(),
        Some(DeploymentTarget {
            operating_system: OperatingSystem::TvOs,
            version: OsVersion::new(16, 4),
        })
    );
}

#[test]
fn core_image_library_with_extern_function() {
    let bytes = LibraryBuilder::new()
        .library_type(1)
        .function(TestFunction::new("myColorKernel", b"ci kernel").function_type(Some(5)))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert_eq!(archive.library_type(), LibraryType::CoreImage);
    assert_eq!(archive.functions().len(), 1);
    assert_eq!(archive.functions()[0].function_type, Some(FunctionType::Extern));
}

#[test]
fn unknown_function_type_is_not_an_error() {
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("future", b"f").function_type(Some(42)))
        .function(TestFunction::new("untyped", b"u").function_type(None))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert_eq!(archive.functions()[0].function_type, None);
    assert_eq!(archive.functions()[0].tag(FourCC::TYPE).unwrap().content, [42]);
    assert_eq!(archive.functions()[1].function_type, None);
    assert!(archive.functions()[1].tag(FourCC::TYPE).is_none());
}

#[test]
fn uninterpreted_tags_are_retained() {
    let bytes = LibraryBuilder::new()
        .function(
            TestFunction::new("vertex_subdiv_quad", b"tess")
                .function_type(Some(0))
                .tag(FourCC::TESS, &[4 << 2 | 2])
                .tag(FourCC::LAYR, &[0x21])
                .tag(FourCC::SOFF, &0u64.to_le_bytes())
                .tag(FourCC(*b"ZZZZ"), b"opaque"),
        )
        .function(TestFunction::new("plain", b"plain"))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    let function = &archive.functions()[0];
    assert_eq!(function.tag(FourCC::TESS).unwrap().content, [4 << 2 | 2]);
    assert_eq!(function.tag(FourCC::LAYR).unwrap().content, [0x21]);
    assert_eq!(function.tag(FourCC(*b"ZZZZ")).unwrap().content, b"opaque");
    assert!(function.is_source_included());
    assert!(!archive.functions()[1].is_source_included());
}

#[test]
fn identical_bitcode_stays_distinct_functions() {
    let body = b"BC\xc0\xde instantiated generic body";
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("add<float>", body))
        .function(TestFunction::new("add<int>", b"BC\xc0\xde other body"))
        .function(TestFunction::new("add<half>", body))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    let functions = archive.functions();
    assert_eq!(functions.len(), 3);
    assert_eq!(functions[0].bitcode, functions[2].bitcode);
    assert_ne!(functions[0].name, functions[2].name);

    let index = archive.bitcode_index();
    assert_eq!(index.ids(), &[0, 1, 0]);
    assert_eq!(index.unique_count(), 2);
}

#[test]
fn function_constants_show_up_in_public_metadata() {
    let bytes = LibraryBuilder::new()
        .function(
            TestFunction::new("testKernel", b"uses constant")
                .public_metadata_tag(FourCC::CNST, b"\x01\x00constantValueA\0\x1d\x00\x00"),
        )
        .function(TestFunction::new("otherKernel", b"no constant"))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert!(archive.functions()[0].public_metadata_tag(FourCC::CNST).is_some());
    assert!(archive.functions()[1].public_metadata_tag(FourCC::CNST).is_none());
}

#[test]
fn private_metadata_tags_are_decoded() {
    let depf = FourCC(*b"DEPF");
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("a", b"a").private_metadata_tag(depf, b"deps"))
        .function(
            TestFunction::new("b", b"b")
                .public_metadata_tag(FourCC(*b"RETR"), b"r")
                .public_metadata_tag(FourCC(*b"ARGR"), b"args"),
        )
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();

    assert_eq!(archive.functions()[0].private_metadata_tag(depf).unwrap().content, b"deps");
    assert!(archive.functions()[0].public_metadata_tags.is_empty());
    let public: Vec<_> = archive.functions()[1]
        .public_metadata_tags
        .iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(public, [FourCC(*b"RETR"), FourCC(*b"ARGR")]);
}

#[test]
fn metadata_decoding_can_be_disabled() {
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("k", b"k").public_metadata_tag(FourCC::CNST, b"c"))
        .build_bytes();
    let archive =
        Archive::decode_with_options(&bytes, &DecodeOptions::default().metadata_tags(false))
            .unwrap();
    assert!(archive.functions()[0].public_metadata_tags.is_empty());
    assert_eq!(archive.functions()[0].bitcode, b"k");
}

#[test]
fn corrupted_bitcode_fails_that_functions_hash_check() {
    let built = two_function_library().build();

    let mut bytes = built.bytes.clone();
    bytes[built.layout.function_bitcode[1].start + 3] ^= 0xff;
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidBitcodeHash {
            index: 1,
            name: "fragment_main".to_owned(),
        })
    );

    let mut bytes = built.bytes.clone();
    bytes[built.layout.function_bitcode[0].end - 1] ^= 0x01;
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidBitcodeHash {
            index: 0,
            name: "vertex_main".to_owned(),
        })
    );
}

#[test]
fn wrong_stored_hash_is_fatal() {
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("k", b"kernel").hash(&[0u8; 32]))
        .build_bytes();
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidBitcodeHash { index: 0, .. })
    ));
}

#[test]
fn function_list_offset_is_validated() {
    let mut bytes = two_function_library().build_bytes();
    patch_u64(&mut bytes, FUNCTION_LIST_OFFSET_FIELD, 0);
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidFunctionListOffset { offset: 0, .. })
    ));

    let mut bytes = two_function_library().build_bytes();
    let len = bytes.len() as u64;
    patch_u64(&mut bytes, FUNCTION_LIST_SIZE_FIELD, len);
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidFunctionListOffset { .. })
    ));

    let mut bytes = two_function_library().build_bytes();
    patch_u64(&mut bytes, FUNCTION_LIST_SIZE_FIELD, u64::MAX);
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidFunctionListOffset { .. })
    ));
}

#[test]
fn function_list_must_end_with_endt() {
    let built = two_function_library().build();
    let mut bytes = built.bytes;
    let end = built.layout.function_list.end;
    bytes[end..end + 4].copy_from_slice(b"NOPE");
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedFunctionListEnding {
            found: FourCC(*b"NOPE"),
        })
    );
}

#[test]
fn zero_bitcode_region_with_functions_is_rejected() {
    let mut bytes = two_function_library().build_bytes();
    patch_u64(&mut bytes, BITCODE_SIZE_FIELD, 0);
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::UnexpectedBitcodeSize)
    );
}

#[test]
fn zero_tag_group_size_is_rejected() {
    let built = two_function_library().build();
    let mut bytes = built.bytes;
    // Function count, then the first entry's group size.
    let group_size_at = built.layout.function_list.start + 4;
    bytes[group_size_at..group_size_at + 4].copy_from_slice(&0u32.to_le_bytes());
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::InvalidTagGroupSize {
            offset: group_size_at,
        })
    );
}

#[test]
fn every_required_tag_must_be_present() {
    for missing in [
        FourCC::NAME,
        FourCC::MDSZ,
        FourCC::OFFT,
        FourCC::HASH,
        FourCC::VERS,
    ] {
        let bytes = LibraryBuilder::new()
            .function(TestFunction::new("ok", b"ok"))
            .function(TestFunction::new("broken", b"broken").omit_tag(missing))
            .build_bytes();
        assert_eq!(
            Archive::decode(&bytes),
            Err(ArchiveError::IncompleteFunctionInfo { index: 1, missing }),
            "omitting {missing}"
        );
    }
}

#[test]
fn recognized_tags_have_exact_sizes() {
    let cases: [(FourCC, &[u8], usize); 5] = [
        (FourCC::HASH, &[0u8; 31], 32),
        (FourCC::MDSZ, &[0u8; 4], 8),
        (FourCC::OFFT, &[0u8; 16], 24),
        (FourCC::VERS, &[0u8; 6], 8),
        (FourCC::TYPE, &[0u8; 2], 1),
    ];
    for (tag, content, expected) in cases {
        let bytes = LibraryBuilder::new()
            .function(TestFunction::new("k", b"k").replace_tag(tag, content))
            .build_bytes();
        let err = Archive::decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::UnexpectedTagContentSize {
                tag,
                expected,
                actual: content.len(),
            }
        );
        assert_eq!(err.tag(), Some(tag));
    }
}

#[test]
fn name_without_terminator_is_kept_whole() {
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("k", b"k").replace_tag(FourCC::NAME, b"kernel"))
        .build_bytes();
    let archive = Archive::decode(&bytes).unwrap();
    assert_eq!(archive.functions()[0].name, "kernel");
}

#[test]
fn invalid_utf8_name_counts_as_missing() {
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("ok", b"ok"))
        .function(TestFunction::new("k", b"k").replace_tag(FourCC::NAME, b"\xff\xfe\0"))
        .build_bytes();
    assert_eq!(
        Archive::decode(&bytes),
        Err(ArchiveError::IncompleteFunctionInfo {
            index: 1,
            missing: FourCC::NAME,
        })
    );
}

#[test]
fn bitcode_outside_buffer_is_out_of_bounds() {
    let mut offt = Vec::new();
    offt.extend_from_slice(&0u64.to_le_bytes());
    offt.extend_from_slice(&0u64.to_le_bytes());
    offt.extend_from_slice(&(1u64 << 40).to_le_bytes());
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("k", b"k").replace_tag(FourCC::OFFT, &offt))
        .build_bytes();
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::Scan(ScanError::IndexOutOfBounds { .. }))
    ));

    let mut offt = Vec::new();
    offt.extend_from_slice(&0u64.to_le_bytes());
    offt.extend_from_slice(&0u64.to_le_bytes());
    offt.extend_from_slice(&u64::MAX.to_le_bytes());
    let bytes = LibraryBuilder::new()
        .function(TestFunction::new("k", b"k").replace_tag(FourCC::OFFT, &offt))
        .build_bytes();
    assert!(matches!(
        Archive::decode(&bytes),
        Err(ArchiveError::Scan(ScanError::IndexOutOfBounds { .. }))
    ));
}

#[test]
fn errors_render_readable_messages() {
    let err = ArchiveError::UnexpectedTagContentSize {
        tag: FourCC::HASH,
        expected: 32,
        actual: 31,
    };
    assert_eq!(
        err.to_string(),
        "unexpected size for tag \"HASH\" (expected 32 bytes, got 31)"
    );
    assert_eq!(
        ArchiveError::UnexpectedTargetPlatform(2).to_string(),
        "unexpected target platform: 0x0002"
    );
    assert_eq!(ArchiveError::InvalidHeader.to_string(), "invalid file header");
}
