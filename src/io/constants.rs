//! Element, attribute and file-name constants of the DIMAP header format

pub const DIMAP_FORMAT_NAME: &str = "DIMAP";
pub const DIMAP_CURRENT_VERSION: &str = "2.12.1";
pub const DIMAP_METADATA_PROFILE: &str = "BEAM-DATAMODEL-V1";
pub const DIMAP_DATASET_SERIES: &str = "BEAM-PRODUCT";
pub const HEADER_FILE_EXTENSION: &str = ".dim";
pub const DATA_DIRECTORY_EXTENSION: &str = ".data";
pub const IMAGE_FILE_EXTENSION: &str = ".img";
pub const ENVI_HEADER_EXTENSION: &str = ".hdr";
pub const TIE_POINT_GRID_DIR_NAME: &str = "tie_point_grids";
pub const VECTOR_DATA_DIR_NAME: &str = "vector_data";
pub const DATA_FILE_FORMAT: &str = "ENVI";
pub const DATA_FILE_FORMAT_DESCRIPTION: &str = "ENVI File Format";
pub const DATA_FILE_ORGANISATION: &str = "BAND_SEPARATE";

// identity and production
pub const TAG_ROOT: &str = "Dimap_Document";
pub const TAG_METADATA_ID: &str = "Metadata_Id";
pub const TAG_METADATA_FORMAT: &str = "METADATA_FORMAT";
pub const TAG_METADATA_PROFILE: &str = "METADATA_PROFILE";
pub const TAG_DATASET_ID: &str = "Dataset_Id";
pub const TAG_DATASET_SERIES: &str = "DATASET_SERIES";
pub const TAG_DATASET_NAME: &str = "DATASET_NAME";
pub const TAG_DATASET_USE: &str = "Dataset_Use";
pub const TAG_DATASET_COMMENTS: &str = "DATASET_COMMENTS";
pub const TAG_DATASET_AUTO_GROUPING: &str = "DATASET_AUTO_GROUPING";
pub const TAG_PRODUCTION: &str = "Production";
pub const TAG_DATASET_PRODUCER_NAME: &str = "DATASET_PRODUCER_NAME";
pub const TAG_PRODUCT_TYPE: &str = "PRODUCT_TYPE";
pub const TAG_QUICKLOOK_BAND_NAME: &str = "QUICKLOOK_BAND_NAME";
pub const TAG_PRODUCT_SCENE_RASTER_START_TIME: &str = "PRODUCT_SCENE_RASTER_START_TIME";
pub const TAG_PRODUCT_SCENE_RASTER_STOP_TIME: &str = "PRODUCT_SCENE_RASTER_STOP_TIME";
pub const TAG_OLD_SCENE_RASTER_START_TIME: &str = "SENSING_START";
pub const TAG_OLD_SCENE_RASTER_STOP_TIME: &str = "SENSING_STOP";

// geocoding
pub const TAG_COORDINATE_REFERENCE_SYSTEM: &str = "Coordinate_Reference_System";
pub const TAG_GEOPOSITION: &str = "Geoposition";
pub const TAG_WKT: &str = "WKT";
pub const TAG_IMAGE_TO_MODEL_TRANSFORM: &str = "IMAGE_TO_MODEL_TRANSFORM";
pub const TAG_GEOCODING_TIE_POINT_GRIDS: &str = "Geocoding_Tie_Point_Grids";
pub const TAG_GEOPOSITION_POINTS: &str = "Geoposition_Points";
pub const TAG_ORIGINAL_GEOCODING: &str = "Original_Geocoding";
pub const TAG_INTERPOLATION_METHOD: &str = "INTERPOLATION_METHOD";
pub const TAG_TIE_POINT_GRID_NAME_LAT: &str = "TIE_POINT_GRID_NAME_LAT";
pub const TAG_TIE_POINT_GRID_NAME_LON: &str = "TIE_POINT_GRID_NAME_LON";
pub const TAG_GEOCODING_MAP: &str = "Geocoding_Map";
pub const TAG_MAP_INFO: &str = "MAP_INFO";
pub const TAG_LATITUDE_BAND: &str = "LATITUDE_BAND";
pub const TAG_LONGITUDE_BAND: &str = "LONGITUDE_BAND";
pub const TAG_VALID_MASK_EXPRESSION: &str = "VALID_MASK_EXPRESSION";
pub const TAG_SEARCH_RADIUS: &str = "SEARCH_RADIUS";
pub const TAG_PIXEL_POSITION_ESTIMATOR: &str = "Pixel_Position_Estimator";
pub const TAG_GEOPOSITION_INSERT: &str = "Geoposition_Insert";
pub const TAG_ULX_MAP: &str = "ULXMAP";
pub const TAG_ULY_MAP: &str = "ULYMAP";
pub const TAG_X_DIM: &str = "XDIM";
pub const TAG_Y_DIM: &str = "YDIM";
pub const TAG_SIMPLIFIED_LOCATION_MODEL: &str = "Simplified_Location_Model";
pub const TAG_DIRECT_LOCATION_MODEL: &str = "Direct_Location_Model";
pub const TAG_REVERSE_LOCATION_MODEL: &str = "Reverse_Location_Model";
pub const TAG_LC_LIST: &str = "lc_List";
pub const TAG_LC: &str = "lc";
pub const TAG_PC_LIST: &str = "pc_List";
pub const TAG_PC: &str = "pc";
pub const TAG_IC_LIST: &str = "ic_List";
pub const TAG_IC: &str = "ic";
pub const TAG_JC_LIST: &str = "jc_List";
pub const TAG_JC: &str = "jc";
pub const TAG_GEO_TABLES: &str = "GEO_TABLES";
pub const TAG_HORIZONTAL_CS: &str = "Horizontal_CS";
pub const TAG_HORIZONTAL_CS_TYPE: &str = "HORIZONTAL_CS_TYPE";
pub const TAG_HORIZONTAL_CS_NAME: &str = "HORIZONTAL_CS_NAME";
pub const TAG_GEOGRAPHIC_CS: &str = "Geographic_CS";
pub const TAG_GEOGRAPHIC_CS_NAME: &str = "GEOGRAPHIC_CS_NAME";
pub const TAG_HORIZONTAL_DATUM: &str = "Horizontal_Datum";
pub const TAG_HORIZONTAL_DATUM_NAME: &str = "HORIZONTAL_DATUM_NAME";
pub const TAG_ELLIPSOID: &str = "Ellipsoid";
pub const TAG_ELLIPSOID_NAME: &str = "ELLIPSOID_NAME";
pub const TAG_ELLIPSOID_PARAMETERS: &str = "Ellipsoid_Parameters";
pub const TAG_ELLIPSOID_MAJ_AXIS: &str = "ELLIPSOID_MAJ_AXIS";
pub const TAG_ELLIPSOID_MIN_AXIS: &str = "ELLIPSOID_MIN_AXIS";
pub const TAG_PROJECTION: &str = "Projection";
pub const TAG_PROJECTION_NAME: &str = "NAME";
pub const TAG_PROJECTION_CT_METHOD: &str = "Projection_CT_Method";
pub const TAG_PROJECTION_CT_NAME: &str = "PROJECTION_CT_NAME";
pub const TAG_PROJECTION_PARAMETERS: &str = "Projection_Parameters";
pub const TAG_PROJECTION_PARAMETER: &str = "Projection_Parameter";
pub const TAG_PROJECTION_PARAMETER_NAME: &str = "PROJECTION_PARAMETER_NAME";
pub const TAG_PROJECTION_PARAMETER_VALUE: &str = "PROJECTION_PARAMETER_VALUE";
pub const TAG_MAP_INFO_PIXEL_X: &str = "PIXEL_X";
pub const TAG_MAP_INFO_PIXEL_Y: &str = "PIXEL_Y";
pub const TAG_MAP_INFO_EASTING: &str = "EASTING";
pub const TAG_MAP_INFO_NORTHING: &str = "NORTHING";
pub const TAG_MAP_INFO_ORIENTATION: &str = "ORIENTATION";
pub const TAG_MAP_INFO_PIXELSIZE_X: &str = "PIXELSIZE_X";
pub const TAG_MAP_INFO_PIXELSIZE_Y: &str = "PIXELSIZE_Y";
pub const TAG_MAP_INFO_NODATA_VALUE: &str = "NODATA_VALUE";
pub const TAG_MAP_INFO_MAPUNIT: &str = "MAPUNIT";
pub const TAG_MAP_INFO_ORTHORECTIFIED: &str = "ORTHORECTIFIED";
pub const TAG_MAP_INFO_ELEVATION_MODEL: &str = "ELEVATION_MODEL";
pub const TAG_MAP_INFO_SCENE_FITTED: &str = "SCENE_FITTED";
pub const TAG_MAP_INFO_SCENE_WIDTH: &str = "SCENE_WIDTH";
pub const TAG_MAP_INFO_SCENE_HEIGHT: &str = "SCENE_HEIGHT";
pub const TAG_MAP_INFO_RESAMPLING: &str = "RESAMPLING";

// sample codings
pub const TAG_FLAG_CODING: &str = "Flag_Coding";
pub const TAG_FLAG: &str = "Flag";
pub const TAG_FLAG_NAME: &str = "Flag_Name";
pub const TAG_FLAG_INDEX: &str = "Flag_Index";
pub const TAG_FLAG_DESCRIPTION: &str = "Flag_description";
pub const TAG_INDEX_CODING: &str = "Index_Coding";
pub const TAG_INDEX: &str = "Index";
pub const TAG_INDEX_NAME: &str = "INDEX_NAME";
pub const TAG_INDEX_VALUE: &str = "INDEX_VALUE";
pub const TAG_INDEX_DESCRIPTION: &str = "INDEX_DESCRIPTION";

// raster layout and data access
pub const TAG_RASTER_DIMENSIONS: &str = "Raster_Dimensions";
pub const TAG_NCOLS: &str = "NCOLS";
pub const TAG_NROWS: &str = "NROWS";
pub const TAG_NBANDS: &str = "NBANDS";
pub const TAG_DATA_ACCESS: &str = "Data_Access";
pub const TAG_DATA_FILE_FORMAT: &str = "DATA_FILE_FORMAT";
pub const TAG_DATA_FILE_FORMAT_DESC: &str = "DATA_FILE_FORMAT_DESC";
pub const TAG_DATA_FILE_ORGANISATION: &str = "DATA_FILE_ORGANISATION";
pub const TAG_DATA_FILE: &str = "Data_File";
pub const TAG_DATA_FILE_PATH: &str = "DATA_FILE_PATH";
pub const TAG_BAND_INDEX: &str = "BAND_INDEX";
pub const TAG_TIE_POINT_GRID_FILE: &str = "Tie_Point_Grid_File";
pub const TAG_TIE_POINT_GRID_FILE_PATH: &str = "TIE_POINT_GRID_FILE_PATH";

// tie-point grids
pub const TAG_TIE_POINT_GRIDS: &str = "Tie_Point_Grids";
pub const TAG_NUM_TIE_POINT_GRIDS: &str = "NUM_TIE_POINT_GRIDS";
pub const TAG_TIE_POINT_GRID_INFO: &str = "Tie_Point_Grid_Info";
pub const TAG_TIE_POINT_GRID_INDEX: &str = "TIE_POINT_GRID_INDEX";
pub const TAG_TIE_POINT_DESCRIPTION: &str = "TIE_POINT_DESCRIPTION";
pub const TAG_TIE_POINT_GRID_NAME: &str = "TIE_POINT_GRID_NAME";
pub const TAG_OFFSET_X: &str = "OFFSET_X";
pub const TAG_OFFSET_Y: &str = "OFFSET_Y";
pub const TAG_STEP_X: &str = "STEP_X";
pub const TAG_STEP_Y: &str = "STEP_Y";
pub const TAG_CYCLIC: &str = "CYCLIC";

// display
pub const TAG_IMAGE_DISPLAY: &str = "Image_Display";
pub const TAG_BAND_STATISTICS: &str = "Band_Statistics";
pub const TAG_STX_MIN: &str = "STX_MIN";
pub const TAG_STX_MAX: &str = "STX_MAX";
pub const TAG_STX_MEAN: &str = "STX_MEAN";
pub const TAG_STX_STDDEV: &str = "STX_STD_DEV";
pub const TAG_STX_LEVEL: &str = "STX_RES_LEVEL";
pub const TAG_HISTOGRAM: &str = "HISTOGRAM";
pub const TAG_NUM_COLORS: &str = "NUM_COLORS";
pub const TAG_COLOR_PALETTE_POINT: &str = "Color_Palette_Point";
pub const TAG_SAMPLE: &str = "SAMPLE";
pub const TAG_LABEL: &str = "LABEL";
pub const TAG_COLOR: &str = "COLOR";
pub const TAG_NO_DATA_COLOR: &str = "NO_DATA_COLOR";
pub const TAG_HISTOGRAM_MATCHING: &str = "HISTOGRAM_MATCHING";
pub const TAG_MASK_USAGE: &str = "Mask_Usage";
pub const TAG_OVERLAY: &str = "OVERLAY";

// band descriptors
pub const TAG_IMAGE_INTERPRETATION: &str = "Image_Interpretation";
pub const TAG_SPECTRAL_BAND_INFO: &str = "Spectral_Band_Info";
pub const TAG_BAND_DESCRIPTION: &str = "BAND_DESCRIPTION";
pub const TAG_BAND_NAME: &str = "BAND_NAME";
pub const TAG_BAND_RASTER_WIDTH: &str = "BAND_RASTER_WIDTH";
pub const TAG_BAND_RASTER_HEIGHT: &str = "BAND_RASTER_HEIGHT";
pub const TAG_DATA_TYPE: &str = "DATA_TYPE";
pub const TAG_PHYSICAL_UNIT: &str = "PHYSICAL_UNIT";
pub const TAG_SOLAR_FLUX: &str = "SOLAR_FLUX";
pub const TAG_SPECTRAL_BAND_INDEX: &str = "SPECTRAL_BAND_INDEX";
pub const TAG_BAND_WAVELEN: &str = "BAND_WAVELEN";
pub const TAG_BANDWIDTH: &str = "BANDWIDTH";
pub const TAG_FLAG_CODING_NAME: &str = "FLAG_CODING_NAME";
pub const TAG_INDEX_CODING_NAME: &str = "INDEX_CODING_NAME";
pub const TAG_SCALING_FACTOR: &str = "SCALING_FACTOR";
pub const TAG_SCALING_OFFSET: &str = "SCALING_OFFSET";
pub const TAG_SCALING_LOG_10: &str = "LOG10_SCALED";
pub const TAG_VALID_MASK_TERM: &str = "VALID_MASK_TERM";
pub const TAG_NO_DATA_VALUE_USED: &str = "NO_DATA_VALUE_USED";
pub const TAG_NO_DATA_VALUE: &str = "NO_DATA_VALUE";
pub const TAG_ANCILLARY_RELATION: &str = "ANCILLARY_RELATION";
pub const TAG_ANCILLARY_VARIABLE: &str = "ANCILLARY_VARIABLE";
pub const TAG_VIRTUAL_BAND: &str = "VIRTUAL_BAND";
pub const TAG_EXPRESSION: &str = "EXPRESSION";
pub const TAG_FILTER_BAND_INFO: &str = "Filter_Band_Info";
pub const TAG_FILTER_SOURCE: &str = "FILTER_SOURCE";
pub const TAG_FILTER_OP_TYPE: &str = "FILTER_OP_TYPE";
pub const TAG_FILTER_SUB_WINDOW_SIZE: &str = "FILTER_SUB_WINDOW_SIZE";
pub const TAG_FILTER_KERNEL: &str = "Filter_Kernel";
pub const TAG_KERNEL_WIDTH: &str = "KERNEL_WIDTH";
pub const TAG_KERNEL_HEIGHT: &str = "KERNEL_HEIGHT";
pub const TAG_KERNEL_X_ORIGIN: &str = "KERNEL_X_ORIGIN";
pub const TAG_KERNEL_Y_ORIGIN: &str = "KERNEL_Y_ORIGIN";
pub const TAG_KERNEL_FACTOR: &str = "KERNEL_FACTOR";
pub const TAG_KERNEL_DATA: &str = "KERNEL_DATA";
pub const BAND_TYPE_GENERAL_FILTER: &str = "GeneralFilterBand";
pub const BAND_TYPE_CONVOLUTION_FILTER: &str = "ConvolutionFilterBand";
pub const GENERAL_FILTER_VERSION: &str = "1.2";

// masks
pub const TAG_MASKS: &str = "Masks";
pub const TAG_MASK: &str = "Mask";
pub const TAG_NAME: &str = "NAME";
pub const TAG_DESCRIPTION: &str = "DESCRIPTION";
pub const TAG_TRANSPARENCY: &str = "TRANSPARENCY";
pub const TAG_MASK_RASTER_WIDTH: &str = "MASK_RASTER_WIDTH";
pub const TAG_MASK_RASTER_HEIGHT: &str = "MASK_RASTER_HEIGHT";
pub const TAG_MINIMUM: &str = "MINIMUM";
pub const TAG_MAXIMUM: &str = "MAXIMUM";
pub const TAG_RASTER: &str = "RASTER";
pub const TAG_BITMASK_DEFINITIONS: &str = "Bitmask_Definitions";
pub const TAG_BITMASK_DEFINITION: &str = "Bitmask_Definition";
pub const TAG_BITMASK_OVERLAY: &str = "Bitmask_Overlay";
pub const TAG_BITMASK: &str = "BITMASK";
pub const MASK_TYPE_MATHS: &str = "Maths";
pub const MASK_TYPE_RANGE: &str = "Range";

// placemarks
pub const TAG_GCP_GROUP: &str = "Gcp_Group";
pub const TAG_PLACEMARK: &str = "Placemark";
pub const TAG_PLACEMARK_LATITUDE: &str = "LATITUDE";
pub const TAG_PLACEMARK_LONGITUDE: &str = "LONGITUDE";
pub const TAG_PLACEMARK_PIXEL_X: &str = "PIXEL_X";
pub const TAG_PLACEMARK_PIXEL_Y: &str = "PIXEL_Y";

// metadata
pub const TAG_DATASET_SOURCES: &str = "Dataset_Sources";
pub const TAG_METADATA_ELEMENT: &str = "MDElem";
pub const TAG_METADATA_ATTRIBUTE: &str = "MDATTR";

pub const ATTRIB_RED: &str = "red";
pub const ATTRIB_GREEN: &str = "green";
pub const ATTRIB_BLUE: &str = "blue";
pub const ATTRIB_ALPHA: &str = "alpha";
pub const ATTRIB_NAMES: &str = "names";
pub const ATTRIB_DESCRIPTION: &str = "desc";
pub const ATTRIB_UNIT: &str = "unit";
pub const ATTRIB_MODE: &str = "mode";
pub const ATTRIB_TYPE: &str = "type";
pub const ATTRIB_ELEMS: &str = "elems";
pub const ATTRIB_NAME: &str = "name";
pub const ATTRIB_VERSION: &str = "version";
pub const ATTRIB_HREF: &str = "href";
pub const ATTRIB_VALUE: &str = "value";
pub const ATTRIB_ORDER: &str = "order";
pub const ATTRIB_INDEX: &str = "index";
pub const ATTRIB_BAND_TYPE: &str = "bandType";
