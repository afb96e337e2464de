//! Field catalog
//!
//! The collector schema drifted across versions, so each logical metric has
//! an ordered list of source fields. Order encodes priority and must not be
//! shuffled: namespaced new name first, flat legacy name second, nested
//! legacy name last. When several candidates are present in one sample the
//! first one wins.

/// A logical metric: the name it gets on the entity and where to find it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub metric: &'static str,
    pub candidates: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(metric: &'static str, candidates: &'static [&'static str]) -> Self {
        FieldSpec { metric, candidates }
    }
}

// === IDENTITY FIELDS ===

pub const CLUSTER_NAME: &[&str] = &["clusterName", "cluster.name", "provider.clusterName"];
pub const BROKER_ID: &[&str] = &["broker.id", "brokerId", "provider.brokerId"];
pub const ENTITY_KEY: &[&str] = &["entityKey", "entity.key", "entityName"];
pub const BROKER_HOST: &[&str] = &["host", "hostname", "broker.host"];
pub const TOPIC_NAME: &[&str] = &["topic.name", "topicName", "topic"];
pub const CONSUMER_GROUP_ID: &[&str] = &[
    "consumerGroup",
    "consumer.group.id",
    "consumerGroupId",
    "groupId",
];
pub const PARTITION_ID: &[&str] = &["partition", "partitionId", "partition.id"];
pub const CONSUMER_GROUP_STATE: &[&str] = &["consumerGroupState", "state", "consumer.state"];
pub const AWS_REGION: &[&str] = &["provider.awsRegion", "awsRegion", "aws.region"];

// === BROKER METRICS ===

pub const BROKER_BYTES_IN: FieldSpec = FieldSpec::new(
    "bytesInPerSecond",
    &["broker.bytesInPerSecond", "bytesInPerSecond", "net.bytesInPerSec"],
);
pub const BROKER_BYTES_OUT: FieldSpec = FieldSpec::new(
    "bytesOutPerSecond",
    &["broker.bytesOutPerSecond", "bytesOutPerSecond", "net.bytesOutPerSec"],
);
pub const BROKER_MESSAGES_IN: FieldSpec = FieldSpec::new(
    "messagesInPerSecond",
    &["broker.messagesInPerSecond", "messagesInPerSecond", "net.messagesInPerSec"],
);
pub const BROKER_MESSAGES_OUT: FieldSpec = FieldSpec::new(
    "messagesOutPerSecond",
    &["broker.messagesOutPerSecond", "messagesOutPerSecond", "net.messagesOutPerSec"],
);
pub const BROKER_BYTES_REJECTED: FieldSpec = FieldSpec::new(
    "bytesRejectedPerSecond",
    &["broker.bytesRejectedPerSecond", "bytesRejectedPerSecond", "net.bytesRejectedPerSec"],
);
pub const BROKER_REQUESTS: FieldSpec = FieldSpec::new(
    "requestsPerSecond",
    &["broker.requestsPerSecond", "requestsPerSecond", "request.requestsPerSec"],
);
pub const BROKER_FETCH_REQUESTS: FieldSpec = FieldSpec::new(
    "fetchRequestsPerSecond",
    &[
        "broker.totalFetchRequestsPerSecond",
        "totalFetchRequestsPerSecond",
        "request.fetchConsumerRequestsPerSec",
    ],
);
pub const BROKER_PRODUCE_REQUESTS: FieldSpec = FieldSpec::new(
    "produceRequestsPerSecond",
    &[
        "broker.totalProduceRequestsPerSecond",
        "totalProduceRequestsPerSecond",
        "request.produceRequestsPerSec",
    ],
);
pub const REQUEST_HANDLER_IDLE: FieldSpec = FieldSpec::new(
    "requestHandlerAvgIdlePercent",
    &[
        "broker.requestHandlerAvgIdlePercent",
        "requestHandlerAvgIdlePercent",
        "request.handlerIdle",
    ],
);
pub const NETWORK_PROCESSOR_IDLE: FieldSpec = FieldSpec::new(
    "networkProcessorAvgIdlePercent",
    &[
        "broker.networkProcessorAvgIdlePercent",
        "networkProcessorAvgIdlePercent",
        "request.networkProcessorIdle",
    ],
);
pub const CPU_PERCENT: FieldSpec = FieldSpec::new(
    "cpuPercent",
    &["broker.cpuPercent", "cpuPercent", "system.cpuPercent"],
);
pub const IO_WAIT_PERCENT: FieldSpec = FieldSpec::new(
    "ioWaitPercent",
    &["broker.ioWaitPercent", "ioWaitPercent", "system.cpuIOWaitPercent"],
);
pub const MEMORY_PERCENT: FieldSpec = FieldSpec::new(
    "memoryPercent",
    &["broker.memoryUsedPercent", "memoryUsedPercent", "system.memoryUsedPercent"],
);
pub const DISK_PERCENT: FieldSpec = FieldSpec::new(
    "diskPercent",
    &["broker.diskUsedPercent", "diskUsedPercent", "system.diskUsedPercent"],
);
pub const BROKER_PARTITIONS: FieldSpec = FieldSpec::new(
    "partitionCount",
    &["broker.partitionCount", "partitionCount", "replication.partitionCount"],
);
pub const BROKER_LEADERS: FieldSpec = FieldSpec::new(
    "leaderCount",
    &["broker.leaderCount", "leaderCount", "replication.leaderCount"],
);
pub const BROKER_UNDER_REPLICATED: FieldSpec = FieldSpec::new(
    "underReplicatedPartitions",
    &[
        "broker.underReplicatedPartitions",
        "underReplicatedPartitions",
        "replication.unreplicatedPartitions",
    ],
);
pub const BROKER_OFFLINE_PARTITIONS: FieldSpec = FieldSpec::new(
    "offlinePartitionsCount",
    &[
        "broker.offlinePartitionsCount",
        "offlinePartitionsCount",
        "cluster.offlinePartitionsCount",
    ],
);
pub const ACTIVE_CONTROLLERS: FieldSpec = FieldSpec::new(
    "activeControllerCount",
    &[
        "broker.activeControllerCount",
        "activeControllerCount",
        "controller.activeControllerCount",
    ],
);
pub const UNDER_MIN_ISR: FieldSpec = FieldSpec::new(
    "underMinIsrPartitions",
    &[
        "broker.underMinIsrPartitionCount",
        "underMinIsrPartitionCount",
        "cluster.underMinIsrPartitionCount",
    ],
);
pub const PRODUCE_THROTTLE: FieldSpec = FieldSpec::new(
    "produceThrottleTimeMs",
    &["broker.produceThrottleTimeMs", "produceThrottleTimeMs", "throttle.produceTimeMs"],
);
pub const FETCH_THROTTLE: FieldSpec = FieldSpec::new(
    "fetchThrottleTimeMs",
    &["broker.fetchThrottleTimeMs", "fetchThrottleTimeMs", "throttle.fetchTimeMs"],
);
pub const FETCH_TOTAL_TIME: FieldSpec = FieldSpec::new(
    "fetchConsumerTotalTimeMs",
    &[
        "broker.fetchConsumerTotalTimeMs",
        "fetchConsumerTotalTimeMs",
        "request.fetchConsumerTotalTimeMs",
    ],
);
pub const PRODUCE_TOTAL_TIME: FieldSpec = FieldSpec::new(
    "produceTotalTimeMs",
    &["broker.produceTotalTimeMs", "produceTotalTimeMs", "request.produceTotalTimeMs"],
);

// === TOPIC METRICS ===

pub const TOPIC_BYTES_IN: FieldSpec = FieldSpec::new(
    "bytesInPerSecond",
    &["topic.bytesInPerSecond", "bytesInPerSecond", "net.bytesInPerSec"],
);
pub const TOPIC_BYTES_OUT: FieldSpec = FieldSpec::new(
    "bytesOutPerSecond",
    &["topic.bytesOutPerSecond", "bytesOutPerSecond", "net.bytesOutPerSec"],
);
pub const TOPIC_MESSAGES_IN: FieldSpec = FieldSpec::new(
    "messagesInPerSecond",
    &["topic.messagesInPerSecond", "messagesInPerSecond", "net.messagesInPerSec"],
);
pub const TOPIC_BYTES_REJECTED: FieldSpec = FieldSpec::new(
    "bytesRejectedPerSecond",
    &["topic.bytesRejectedPerSecond", "bytesRejectedPerSecond", "net.bytesRejectedPerSec"],
);
pub const TOPIC_FETCH_REQUESTS: FieldSpec = FieldSpec::new(
    "fetchRequestsPerSecond",
    &["topic.fetchRequestsPerSecond", "fetchRequestsPerSecond", "request.fetchRequestsPerSec"],
);
pub const TOPIC_PRODUCE_REQUESTS: FieldSpec = FieldSpec::new(
    "produceRequestsPerSecond",
    &[
        "topic.produceRequestsPerSecond",
        "produceRequestsPerSecond",
        "request.produceRequestsPerSec",
    ],
);
pub const TOPIC_PARTITIONS: FieldSpec = FieldSpec::new(
    "partitionCount",
    &["topic.partitionCount", "partitionCount", "config.partitionCount"],
);
pub const TOPIC_REPLICATION_FACTOR: FieldSpec = FieldSpec::new(
    "replicationFactor",
    &["topic.replicationFactor", "replicationFactor", "config.replicationFactor"],
);
pub const TOPIC_MIN_ISR: FieldSpec = FieldSpec::new(
    "minInSyncReplicas",
    &["topic.minInSyncReplicas", "minInSyncReplicas", "config.minInSyncReplicas"],
);
pub const TOPIC_RETENTION_MS: FieldSpec = FieldSpec::new(
    "retentionMs",
    &["topic.retentionMs", "retentionMs", "config.retentionMs"],
);
pub const TOPIC_RETENTION_BYTES: FieldSpec = FieldSpec::new(
    "retentionBytes",
    &["topic.retentionBytes", "retentionBytes", "config.retentionBytes"],
);
pub const TOPIC_DISK_SIZE: FieldSpec = FieldSpec::new(
    "diskSize",
    &["topic.diskSize", "topic.sizeInBytes", "diskSize", "log.sizeInBytes"],
);
pub const TOPIC_UNDER_REPLICATED: FieldSpec = FieldSpec::new(
    "underReplicatedPartitions",
    &[
        "topic.underReplicatedPartitions",
        "underReplicatedPartitions",
        "replication.unreplicatedPartitions",
    ],
);

// === CONSUMER GROUP METRICS ===

pub const TOTAL_LAG: FieldSpec = FieldSpec::new(
    "totalLag",
    &["consumer.totalLag", "totalLag", "consumerLag"],
);
pub const MAX_LAG: FieldSpec = FieldSpec::new(
    "maxLag",
    &["consumer.maxLag", "maxLag", "consumer.maxOffsetLag"],
);
pub const AVG_LAG: FieldSpec = FieldSpec::new(
    "avgLag",
    &["consumer.avgLag", "avgLag", "consumer.averageLag"],
);
pub const PARTITION_LAG: FieldSpec = FieldSpec::new(
    "partitionLag",
    &["consumer.partitionLag", "partitionLag", "consumer.lag"],
);
pub const PREVIOUS_TOTAL_LAG: FieldSpec = FieldSpec::new(
    "previousTotalLag",
    &["consumer.previousTotalLag", "previousTotalLag", "lag.previousTotal"],
);
pub const GROUP_PARTITIONS: FieldSpec = FieldSpec::new(
    "partitionCount",
    &["consumer.partitionCount", "partitionCount", "assignment.partitionCount"],
);
pub const GROUP_MEMBERS: FieldSpec = FieldSpec::new(
    "memberCount",
    &["consumer.memberCount", "memberCount", "group.memberCount"],
);

/// Output names of metrics that only exist on entities (derived or rolled up)
pub mod names {
    pub const CPU_PERCENT: &str = "cpuPercent";
    pub const DISK_SIZE_MB: &str = "diskSizeMB";
    pub const LAG_STABILITY_SCORE: &str = "lagStabilityScore";
    pub const HEALTH_SCORE: &str = "healthScore";

    pub const CPU_PERCENT_AVERAGE: &str = "cpuPercentAverage";
    pub const CPU_PERCENT_MAXIMUM: &str = "cpuPercentMaximum";
    pub const MEMORY_PERCENT_AVERAGE: &str = "memoryPercentAverage";
    pub const MEMORY_PERCENT_MAXIMUM: &str = "memoryPercentMaximum";
    pub const DISK_PERCENT_AVERAGE: &str = "diskPercentAverage";
    pub const DISK_PERCENT_MAXIMUM: &str = "diskPercentMaximum";

    pub const BROKER_COUNT: &str = "brokerCount";
    pub const BROKERS_ONLINE: &str = "brokersOnline";
    pub const BROKERS_OFFLINE: &str = "brokersOffline";

    pub const TOPIC_COUNT: &str = "topicCount";
    pub const TOTAL_PARTITIONS: &str = "totalPartitions";
    pub const AVERAGE_PARTITIONS_PER_TOPIC: &str = "averagePartitionsPerTopic";
    pub const AVERAGE_REPLICATION_FACTOR: &str = "averageReplicationFactor";

    pub const CONSUMER_GROUP_COUNT: &str = "consumerGroupCount";
    pub const TOTAL_CONSUMER_LAG: &str = "totalConsumerLag";
    pub const MAX_CONSUMER_LAG: &str = "maxConsumerLag";
    pub const AVERAGE_CONSUMER_LAG: &str = "averageConsumerLag";
}

/// Tag keys shared by every entity kind
pub mod tags {
    pub const CLUSTER_NAME: &str = "clusterName";
    pub const PROVIDER: &str = "provider";
    pub const ACCOUNT_ID: &str = "accountId";
    pub const ENVIRONMENT: &str = "environment";
    pub const MESSAGE_QUEUE_TYPE: &str = "messageQueueType";
    pub const AWS_REGION: &str = "awsRegion";
    pub const HEALTH_STATUS: &str = "healthStatus";
    pub const BROKER_ID: &str = "brokerId";
    pub const TOPIC_NAME: &str = "topicName";
    pub const CONSUMER_GROUP: &str = "consumerGroup";
    pub const PARTITION: &str = "partition";
    pub const CONSUMER_GROUP_STATE: &str = "consumerGroupState";
    pub const LAG_TREND: &str = "lagTrend";
}
